//! flowsync API - Bulk Configuration Endpoint and Backend Reconciliation
//!
//! This crate wires the flow cache to the outside world. It serves the
//! `flowsync.configuration.ConfigurationService` gRPC endpoint for push
//! updates, pulls authoritative flows from the backend `FlowService` to
//! repair divergent cache entries, and hosts the `flowsync` binary.

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod fallback;
pub mod grpc;
pub mod jobs;
pub mod proto;
pub mod reconcile;
pub mod telemetry;

// Re-export commonly used types
pub use backend::{connect_with_retry, BackoffPolicy, FlowQuery, FlowSource, GrpcFlowSource};
pub use config::{ServiceConfig, StartupMode};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use fallback::seed_from_fallback;
pub use grpc::{create_service, ConfigurationServiceImpl};
pub use jobs::{scheduled_reconcile_task, ScheduledReconcileConfig, ScheduledReconcileMetrics};
pub use reconcile::{ReconcileHandle, ReconciliationService};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
