//! Backend flow source.
//!
//! The backend is the authoritative holder of flows. Reconciliation only
//! needs one call from it: "give me the current flows for this query". That
//! call is the [`FlowSource`] trait; [`GrpcFlowSource`] implements it over
//! the `flowsync.backend.FlowService/GetFlow` RPC.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use flowsync_core::{BackendError, ConfigError, Flow, FlowId, ScopeId};
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use crate::constants::{
    BACKEND_CONNECT_TIMEOUT_SECS, BACKEND_INITIAL_BACKOFF_MS, BACKEND_MAX_BACKOFF_MS,
    BACKEND_REQUEST_TIMEOUT_SECS,
};
use crate::proto::backend::flow_service_client::FlowServiceClient;
use crate::proto::{flow_request, flows_from_wire, FlowRequest};

// ============================================================================
// QUERY
// ============================================================================

/// What to ask the backend for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowQuery {
    /// A single flow.
    Flow(FlowId),
    /// Every flow of one configuration.
    Configuration(ScopeId),
}

impl FlowQuery {
    pub fn to_request(&self) -> FlowRequest {
        let query = match self {
            FlowQuery::Flow(flow_id) => flow_request::Query::FlowId(flow_id.as_i64()),
            FlowQuery::Configuration(scope) => {
                flow_request::Query::ConfigurationId(scope.as_str().to_string())
            }
        };
        FlowRequest { query: Some(query) }
    }
}

impl fmt::Display for FlowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowQuery::Flow(flow_id) => write!(f, "flow {}", flow_id),
            FlowQuery::Configuration(scope) => write!(f, "configuration {}", scope),
        }
    }
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// Source of authoritative flows.
#[async_trait]
pub trait FlowSource: Send + Sync {
    /// Fetch the current flows matching `query`.
    async fn fetch(&self, query: &FlowQuery) -> Result<Vec<Flow>, BackendError>;
}

// ============================================================================
// GRPC SOURCE
// ============================================================================

/// [`FlowSource`] over the backend gRPC service.
#[derive(Clone)]
pub struct GrpcFlowSource {
    client: FlowServiceClient<Channel>,
    authorization: Option<AsciiMetadataValue>,
}

impl GrpcFlowSource {
    /// Wrap an established channel. The session token, if any, is sent as
    /// `authorization: Bearer <token>` on every request.
    pub fn new(channel: Channel, session_token: Option<&str>) -> Result<Self, ConfigError> {
        let authorization = session_token
            .map(|token| {
                format!("Bearer {}", token)
                    .parse::<AsciiMetadataValue>()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "FLOWSYNC_SESSION_TOKEN".to_string(),
                        value: "<redacted>".to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        Ok(Self {
            client: FlowServiceClient::new(channel),
            authorization,
        })
    }
}

#[async_trait]
impl FlowSource for GrpcFlowSource {
    async fn fetch(&self, query: &FlowQuery) -> Result<Vec<Flow>, BackendError> {
        let mut request = tonic::Request::new(query.to_request());
        if let Some(authorization) = &self.authorization {
            request
                .metadata_mut()
                .insert("authorization", authorization.clone());
        }

        let mut client = self.client.clone();
        let response = client.get_flow(request).await.map_err(status_to_error)?;

        let flows = flows_from_wire(response.into_inner().flows).map_err(|e| {
            BackendError::InvalidResponse {
                reason: e.to_string(),
            }
        })?;
        tracing::debug!(query = %query, flows = flows.len(), "Fetched flows from backend");
        Ok(flows)
    }
}

/// Map a gRPC status onto the backend error taxonomy.
pub fn status_to_error(status: Status) -> BackendError {
    match status.code() {
        // tonic reports connection failures as UNAVAILABLE with a transport source
        Code::Unavailable if std::error::Error::source(&status).is_some() => {
            BackendError::Transport {
                reason: status.message().to_string(),
            }
        }
        code => BackendError::Status {
            code: format!("{:?}", code),
            message: status.message().to_string(),
        },
    }
}

// ============================================================================
// CONNECTION WITH RETRY
// ============================================================================

/// Exponential backoff for backend connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            initial: Duration::from_millis(BACKEND_INITIAL_BACKOFF_MS),
            max: Duration::from_millis(BACKEND_MAX_BACKOFF_MS),
            max_attempts,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Connect to the backend, retrying with exponential backoff.
///
/// An unparseable URL fails immediately. Connection failures are retried
/// until `policy.max_attempts` attempts have been made.
pub async fn connect_with_retry(url: &str, policy: BackoffPolicy) -> Result<Channel, BackendError> {
    let endpoint = Endpoint::from_shared(url.to_string())
        .map_err(|e| BackendError::Transport {
            reason: format!("invalid backend url '{}': {}", url, e),
        })?
        .connect_timeout(Duration::from_secs(BACKEND_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(BACKEND_REQUEST_TIMEOUT_SECS));

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match endpoint.connect().await {
            Ok(channel) => {
                tracing::info!(url = url, attempt = attempt, "Connected to backend");
                return Ok(channel);
            }
            Err(e) if attempt >= policy.max_attempts => {
                tracing::error!(
                    url = url,
                    attempts = attempt,
                    error = %e,
                    "Giving up connecting to backend"
                );
                return Err(BackendError::Transport {
                    reason: format!("{} after {} attempts", e, attempt),
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    url = url,
                    attempt = attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Backend connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
