//! flowsync Core - Flow Types
//!
//! Pure data structures shared by the storage and API crates, plus the
//! staleness rule that decides whether a cached flow needs repair.
//! Nothing in this crate performs I/O.

pub mod error;
pub mod staleness;

pub use error::{
    BackendError, ConfigError, FlowsyncError, FlowsyncResult, StoreError, ValidationError,
};
pub use staleness::is_current;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
///
/// Flow timestamps carry second precision; see [`Flow::new`].
pub type Timestamp = DateTime<Utc>;

/// Scope token reserved for the reconciliation key namespace (`flow:{id}`).
pub const RECONCILED_NAMESPACE: &str = "flow";

/// Identifier of a flow, unique within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(i64);

impl FlowId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for FlowId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FlowId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|e| ValidationError::InvalidFlowId {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Organisation or configuration identifier grouping a set of flows.
///
/// The push path addresses scopes by a 64-bit configuration id, the pull
/// path by a string configuration id. Both end up as the same opaque token.
/// String tokens are validated: non-empty, no whitespace, and never equal to
/// [`RECONCILED_NAMESPACE`], which would alias the reconciliation keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeId(String);

impl ScopeId {
    /// Parse a string scope token.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::InvalidScopeId {
                value,
                reason: "scope id must not be empty".to_string(),
            });
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidScopeId {
                value,
                reason: "scope id must not contain whitespace".to_string(),
            });
        }
        if value == RECONCILED_NAMESPACE {
            return Err(ValidationError::InvalidScopeId {
                value,
                reason: format!("'{}' is reserved for reconciled flows", RECONCILED_NAMESPACE),
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for ScopeId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<String> for ScopeId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ScopeId> for String {
    fn from(scope: ScopeId) -> Self {
        scope.0
    }
}

impl FromStr for ScopeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// FLOW
// ============================================================================

/// A unit of configuration cached and reconciled by flowsync.
///
/// Flows are immutable value objects. The cache never patches a flow, it
/// replaces the whole entry. `last_updated` is the staleness marker and is
/// stored as epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub flow_id: FlowId,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_updated: Timestamp,
    /// Opaque payload, never inspected by the cache.
    #[serde(default)]
    pub definition: serde_json::Value,
}

impl Flow {
    /// Create a flow, truncating `last_updated` to whole seconds so that the
    /// value survives a round trip through the cache unchanged.
    pub fn new(flow_id: FlowId, last_updated: Timestamp, definition: serde_json::Value) -> Self {
        Self {
            flow_id,
            last_updated: last_updated.trunc_subsecs(0),
            definition,
        }
    }

    /// Create a flow from an epoch-seconds timestamp as carried on the wire.
    pub fn from_epoch_seconds(
        flow_id: FlowId,
        last_updated_secs: i64,
        definition: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let last_updated = timestamp_from_epoch_seconds(last_updated_secs)?;
        Ok(Self::new(flow_id, last_updated, definition))
    }

    /// `last_updated` as epoch seconds.
    pub fn last_updated_epoch_seconds(&self) -> i64 {
        self.last_updated.timestamp()
    }
}

/// Convert epoch seconds into a [`Timestamp`].
pub fn timestamp_from_epoch_seconds(secs: i64) -> Result<Timestamp, ValidationError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(ValidationError::InvalidTimestamp { value: secs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_id_from_integer() {
        let scope = ScopeId::from(42);
        assert_eq!(scope.as_str(), "42");
        assert_eq!(scope.to_string(), "42");
    }

    #[test]
    fn test_scope_id_rejects_reserved_namespace() {
        let err = ScopeId::parse("flow").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidScopeId { .. }));
    }

    #[test]
    fn test_scope_id_rejects_empty_and_whitespace() {
        assert!(ScopeId::parse("").is_err());
        assert!(ScopeId::parse("org 1").is_err());
        assert!(ScopeId::parse("org-1").is_ok());
    }

    #[test]
    fn test_scope_id_deserialize_validates() {
        let ok: ScopeId = serde_json::from_str("\"cfg-7\"").unwrap();
        assert_eq!(ok.as_str(), "cfg-7");
        assert!(serde_json::from_str::<ScopeId>("\"flow\"").is_err());
    }

    #[test]
    fn test_flow_id_parse() {
        assert_eq!("17".parse::<FlowId>().unwrap(), FlowId::new(17));
        assert!("x17".parse::<FlowId>().is_err());
    }

    #[test]
    fn test_flow_new_truncates_subseconds() {
        let ts = Utc.timestamp_opt(1_700_000_000, 987_654_321).single().unwrap();
        let flow = Flow::new(FlowId::new(1), ts, json!(null));
        assert_eq!(flow.last_updated_epoch_seconds(), 1_700_000_000);
        assert_eq!(flow.last_updated.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_flow_json_uses_epoch_seconds() {
        let flow = Flow::from_epoch_seconds(FlowId::new(3), 1_700_000_123, json!({"nodes": []}))
            .unwrap();
        let value = serde_json::to_value(&flow).unwrap();
        assert_eq!(value["flow_id"], json!(3));
        assert_eq!(value["last_updated"], json!(1_700_000_123));
        assert_eq!(value["definition"], json!({"nodes": []}));

        let back: Flow = serde_json::from_value(value).unwrap();
        assert_eq!(back, flow);
    }

    #[test]
    fn test_flow_definition_defaults_to_null() {
        let flow: Flow = serde_json::from_str(r#"{"flow_id":5,"last_updated":10}"#).unwrap();
        assert_eq!(flow.definition, serde_json::Value::Null);
    }

    #[test]
    fn test_timestamp_out_of_range() {
        assert!(matches!(
            timestamp_from_epoch_seconds(i64::MAX),
            Err(ValidationError::InvalidTimestamp { .. })
        ));
    }
}
