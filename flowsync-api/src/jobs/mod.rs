//! Background Jobs for flowsync
//!
//! - `scheduled_reconcile`: Pulls configured configurations from the backend
//!   and repairs divergent cache entries
//!
//! # Usage
//!
//! ```ignore
//! use flowsync_api::jobs::{scheduled_reconcile_task, ScheduledReconcileConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let config = ScheduledReconcileConfig::from(&service_config);
//! let job = tokio::spawn(scheduled_reconcile_task(service, config, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = job.await?;
//! ```

pub mod scheduled_reconcile;

pub use scheduled_reconcile::{
    reconcile_configurations, scheduled_reconcile_task, ScheduledReconcileConfig, ScheduledReconcileMetrics,
    ScheduledReconcileSnapshot,
};
