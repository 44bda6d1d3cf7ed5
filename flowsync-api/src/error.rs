//! Error Types for flowsync API
//!
//! This module defines error handling for the API layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - Conversion into tonic `Status` for gRPC replies
//!
//! Batch outcomes never travel as errors; a failed cache write is a
//! `success = false` reply. `ApiError` covers malformed requests and startup
//! failures.

use flowsync_core::{ConfigError, FlowsyncError, StoreError, ValidationError};
use std::fmt;
use tonic::Status;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Service configuration is missing or invalid
    ConfigurationError,

    /// Cache store could not be reached
    StoreUnavailable,

    /// Backend could not be reached
    BackendUnavailable,

    /// Background work was cancelled before it finished
    Cancelled,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::ConfigurationError => "Invalid service configuration",
            ErrorCode::StoreUnavailable => "Cache store unavailable",
            ErrorCode::BackendUnavailable => "Backend unavailable",
            ErrorCode::Cancelled => "Operation cancelled",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error for API operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("Missing required field: {}", field))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BackendUnavailable, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ApiError> for Status {
    fn from(err: ApiError) -> Self {
        match err.code {
            ErrorCode::InvalidInput | ErrorCode::MissingField => {
                Status::invalid_argument(err.message)
            }
            ErrorCode::ConfigurationError => Status::failed_precondition(err.message),
            ErrorCode::StoreUnavailable | ErrorCode::BackendUnavailable => {
                Status::unavailable(err.message)
            }
            ErrorCode::Cancelled => Status::cancelled(err.message),
            ErrorCode::InternalError => Status::internal(err.message),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            other => ApiError::invalid_input(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::configuration(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Connection { .. } => ApiError::store_unavailable(err.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<FlowsyncError> for ApiError {
    fn from(err: FlowsyncError) -> Self {
        match err {
            FlowsyncError::Store(e) => e.into(),
            FlowsyncError::Backend(e) => ApiError::backend_unavailable(e.to_string()),
            FlowsyncError::Validation(e) => e.into(),
            FlowsyncError::Config(e) => e.into(),
        }
    }
}

impl From<tonic::transport::Error> for ApiError {
    fn from(err: tonic::transport::Error) -> Self {
        tracing::error!("gRPC transport error: {:?}", err);
        ApiError::internal(format!("gRPC transport error: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
