//! Error types for flowsync operations

use thiserror::Error;

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store connection failed: {reason}")]
    Connection { reason: String },

    #[error("Cache command {command} failed on {key}: {reason}")]
    Command {
        command: &'static str,
        key: String,
        reason: String,
    },

    #[error("Unexpected reply to {command} on {key}: {reply}")]
    UnexpectedReply {
        command: &'static str,
        key: String,
        reply: String,
    },

    #[error("Failed to encode flow {flow_id}: {reason}")]
    Encode { flow_id: i64, reason: String },
}

/// Backend RPC errors.
///
/// Both transport failures and application-level status codes end up here,
/// so the reconciliation callback sees a single failure type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend transport error: {reason}")]
    Transport { reason: String },

    #[error("Backend returned status {code}: {message}")]
    Status { code: String, message: String },

    #[error("Invalid backend response: {reason}")]
    InvalidResponse { reason: String },
}

impl BackendError {
    /// Status code label for log events.
    pub fn status_code(&self) -> &str {
        match self {
            Self::Transport { .. } => "TRANSPORT",
            Self::Status { code, .. } => code,
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
        }
    }

    /// Human readable description of the failure.
    pub fn description(&self) -> &str {
        match self {
            Self::Transport { reason } => reason,
            Self::Status { message, .. } => message,
            Self::InvalidResponse { reason } => reason,
        }
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid scope id '{value}': {reason}")]
    InvalidScopeId { value: String, reason: String },

    #[error("Invalid flow id '{value}': {reason}")]
    InvalidFlowId { value: String, reason: String },

    #[error("Invalid timestamp: {value} is out of range")]
    InvalidTimestamp { value: i64 },

    #[error("Invalid payload for flow {flow_id}: {reason}")]
    InvalidPayload { flow_id: i64, reason: String },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all flowsync errors.
#[derive(Debug, Clone, Error)]
pub enum FlowsyncError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for flowsync operations.
pub type FlowsyncResult<T> = Result<T, FlowsyncError>;
