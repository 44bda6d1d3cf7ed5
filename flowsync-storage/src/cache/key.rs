//! Cache key scheme for flows.
//!
//! Two namespaces share the store:
//!
//! - `{scope}:{flow_id}` for flows pushed through the configuration endpoint
//! - `flow:{flow_id}` for flows repaired by reconciliation
//!
//! The flow id is always the last `:`-separated segment and always an
//! integer, and the scope token `flow` is rejected by [`ScopeId::parse`], so
//! two distinct (scope, flow) pairs never render to the same key.

use flowsync_core::{FlowId, ScopeId, RECONCILED_NAMESPACE};
use std::fmt;

/// Separator between the scope token and the flow id.
pub const SEPARATOR: char = ':';

/// A fully rendered cache key.
///
/// Keys can only be built through [`CacheKey::scoped`] or
/// [`CacheKey::reconciled`]; stores in this crate rebuild keys they read back
/// from the backing store with `from_stored`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    rendered: String,
}

impl CacheKey {
    /// Key of a flow inside a scope, used by batch mutations.
    pub fn scoped(scope: &ScopeId, flow_id: FlowId) -> Self {
        Self {
            rendered: format!("{}{}{}", scope, SEPARATOR, flow_id),
        }
    }

    /// Scope-less key used by reconciliation.
    pub fn reconciled(flow_id: FlowId) -> Self {
        Self {
            rendered: format!("{}{}{}", RECONCILED_NAMESPACE, SEPARATOR, flow_id),
        }
    }

    /// Prefix covering every scoped key of `scope`.
    pub fn scope_prefix(scope: &ScopeId) -> KeyPrefix {
        KeyPrefix {
            rendered: format!("{}{}", scope, SEPARATOR),
        }
    }

    pub(crate) fn from_stored(rendered: String) -> Self {
        Self { rendered }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// The flow id encoded in the last segment, if any.
    pub fn flow_id(&self) -> Option<FlowId> {
        self.rendered
            .rsplit_once(SEPARATOR)
            .and_then(|(_, id)| id.parse::<FlowId>().ok())
    }

    /// Returns true if this key lives in the reconciliation namespace.
    pub fn is_reconciled(&self) -> bool {
        self.rendered
            .split_once(SEPARATOR)
            .is_some_and(|(head, tail)| head == RECONCILED_NAMESPACE && !tail.contains(SEPARATOR))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Prefix for listing the keys of one scope.
///
/// A raw prefix match is wider than the scope: `1:` also matches keys of a
/// scope named `1:2`. [`KeyPrefix::flow_id_of`] narrows the match to keys
/// whose remainder is exactly one flow id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix {
    rendered: String,
}

impl KeyPrefix {
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// The flow id of `key` if it belongs to exactly this scope.
    pub fn flow_id_of(&self, key: &CacheKey) -> Option<FlowId> {
        let rest = key.as_str().strip_prefix(self.rendered.as_str())?;
        if rest.contains(SEPARATOR) {
            return None;
        }
        rest.parse::<FlowId>().ok()
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}
