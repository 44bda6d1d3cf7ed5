//! Wire messages and generated gRPC stubs.
//!
//! ```text
//! package flowsync.backend;
//! service FlowService {
//!   rpc GetFlow(FlowRequest) returns (FlowResponse);
//! }
//!
//! package flowsync.configuration;
//! service ConfigurationService {
//!   rpc Update(ConfigurationRequest) returns (ConfigurationResponse);
//!   rpc Delete(ConfigurationRequest) returns (ConfigurationResponse);
//! }
//! ```

use flowsync_core::{FlowId, ValidationError};

/// A flow as carried on the wire.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Flow {
    #[prost(int64, tag = "1")]
    pub flow_id: i64,
    /// Epoch seconds.
    #[prost(int64, tag = "2")]
    pub last_updated: i64,
    /// JSON text; empty means no definition.
    #[prost(string, tag = "3")]
    pub definition: String,
}

/// Request for authoritative flows, by flow or by configuration.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FlowRequest {
    #[prost(oneof = "flow_request::Query", tags = "1, 2")]
    pub query: Option<flow_request::Query>,
}

pub mod flow_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Query {
        #[prost(int64, tag = "1")]
        FlowId(i64),
        #[prost(string, tag = "2")]
        ConfigurationId(String),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FlowResponse {
    #[prost(message, repeated, tag = "1")]
    pub flows: Vec<Flow>,
}

/// One configuration and the flows it owns.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Configuration {
    #[prost(int64, tag = "1")]
    pub configuration_id: i64,
    #[prost(message, repeated, tag = "2")]
    pub flows: Vec<Flow>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConfigurationRequest {
    #[prost(message, optional, tag = "1")]
    pub configuration: Option<Configuration>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ConfigurationResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
}

pub mod backend {
    include!(concat!(env!("OUT_DIR"), "/flowsync.backend.FlowService.rs"));
}

pub mod configuration {
    include!(concat!(env!("OUT_DIR"), "/flowsync.configuration.ConfigurationService.rs"));
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<&flowsync_core::Flow> for Flow {
    fn from(flow: &flowsync_core::Flow) -> Self {
        let definition = if flow.definition.is_null() {
            String::new()
        } else {
            flow.definition.to_string()
        };
        Self {
            flow_id: flow.flow_id.as_i64(),
            last_updated: flow.last_updated_epoch_seconds(),
            definition,
        }
    }
}

impl TryFrom<Flow> for flowsync_core::Flow {
    type Error = ValidationError;

    fn try_from(wire: Flow) -> Result<Self, Self::Error> {
        let definition = if wire.definition.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&wire.definition).map_err(|e| {
                ValidationError::InvalidPayload {
                    flow_id: wire.flow_id,
                    reason: format!("definition is not valid JSON: {}", e),
                }
            })?
        };
        flowsync_core::Flow::from_epoch_seconds(FlowId::new(wire.flow_id), wire.last_updated, definition)
    }
}

/// Convert a list of wire flows, failing on the first malformed one.
pub fn flows_from_wire(flows: Vec<Flow>) -> Result<Vec<flowsync_core::Flow>, ValidationError> {
    flows.into_iter().map(flowsync_core::Flow::try_from).collect()
}
