//! Constants for flowsync API
//!
//! Defaults for every configuration value, plus the limits of the backend
//! connection retry loop.

// ============================================================================
// CACHE STORE
// ============================================================================

/// Default Redis host
pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";

/// Default Redis port
pub const DEFAULT_REDIS_PORT: u16 = 6379;

// ============================================================================
// GRPC ENDPOINT
// ============================================================================

/// Default bind address of the configuration endpoint
pub const DEFAULT_GRPC_BIND: &str = "0.0.0.0:8081";

/// Whether the configuration endpoint is served by default
pub const DEFAULT_ENABLE_GRPC_UPDATE: bool = true;

// ============================================================================
// STARTUP
// ============================================================================

/// Flow list seeded into the cache in static mode
pub const DEFAULT_FLOW_FALLBACK_PATH: &str = "./configuration/configuration.json";

// ============================================================================
// SCHEDULED RECONCILIATION
// ============================================================================

/// Whether scheduled reconciliation runs by default
pub const DEFAULT_ENABLE_SCHEDULED_UPDATE: bool = false;

/// Default interval between reconciliation runs in seconds (5 minutes)
pub const DEFAULT_UPDATE_SCHEDULE_INTERVAL_SECS: u64 = 300;

// ============================================================================
// BACKEND CONNECTION
// ============================================================================

/// Default number of connection attempts before giving up
pub const DEFAULT_BACKEND_CONNECT_RETRIES: u32 = 10;

/// First retry delay in milliseconds
pub const BACKEND_INITIAL_BACKOFF_MS: u64 = 100;

/// Upper bound on the retry delay in milliseconds (2 minutes)
pub const BACKEND_MAX_BACKOFF_MS: u64 = 120_000;

/// Connect timeout for the backend channel in seconds
pub const BACKEND_CONNECT_TIMEOUT_SECS: u64 = 2;

/// Per-request timeout for backend calls in seconds
pub const BACKEND_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// LOGGING
// ============================================================================

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "flowsync_api=debug,flowsync_storage=debug,info";
