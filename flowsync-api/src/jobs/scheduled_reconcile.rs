//! Scheduled Reconciliation Background Task
//!
//! Periodically reconciles every configured configuration id against the
//! backend, so cache divergence is repaired even when no push arrives.
//!
//! # Configuration
//!
//! ```rust
//! use flowsync_api::jobs::ScheduledReconcileConfig;
//! use flowsync_core::ScopeId;
//! use std::time::Duration;
//!
//! let config = ScheduledReconcileConfig {
//!     interval: Duration::from_secs(300),             // Every five minutes
//!     configuration_ids: vec![ScopeId::from(1)],      // Configurations to pull
//! };
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowsync_core::ScopeId;
use flowsync_storage::CacheStore;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::backend::{FlowQuery, FlowSource};
use crate::config::ServiceConfig;
use crate::constants::DEFAULT_UPDATE_SCHEDULE_INTERVAL_SECS;
use crate::reconcile::ReconciliationService;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the scheduled reconciliation task.
#[derive(Debug, Clone)]
pub struct ScheduledReconcileConfig {
    /// How often to reconcile (default: 300 seconds)
    pub interval: Duration,

    /// Configurations reconciled on every cycle
    pub configuration_ids: Vec<ScopeId>,
}

impl Default for ScheduledReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_UPDATE_SCHEDULE_INTERVAL_SECS),
            configuration_ids: Vec::new(),
        }
    }
}

impl From<&ServiceConfig> for ScheduledReconcileConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            interval: config.update_schedule_interval,
            configuration_ids: config.configuration_ids.clone(),
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Metrics for scheduled reconciliation.
#[derive(Debug, Default)]
pub struct ScheduledReconcileMetrics {
    /// Total cycles completed
    pub cycles: AtomicU64,

    /// Reconciliations whose backend fetch failed
    pub failed_fetches: AtomicU64,

    /// Reconciliations that were cancelled or panicked
    pub aborted_runs: AtomicU64,

    /// Cache entries inserted or overwritten
    pub flows_repaired: AtomicU64,
}

impl ScheduledReconcileMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> ScheduledReconcileSnapshot {
        ScheduledReconcileSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            failed_fetches: self.failed_fetches.load(Ordering::Relaxed),
            aborted_runs: self.aborted_runs.load(Ordering::Relaxed),
            flows_repaired: self.flows_repaired.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scheduled reconciliation metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledReconcileSnapshot {
    pub cycles: u64,
    pub failed_fetches: u64,
    pub aborted_runs: u64,
    pub flows_repaired: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that reconciles the configured configurations on a timer.
///
/// Runs until `true` is sent on the shutdown channel or its sender is
/// dropped. A cycle that is in progress when shutdown arrives is finished
/// first.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(scheduled_reconcile_task(service, config, shutdown_rx));
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn scheduled_reconcile_task<S, B>(
    service: ReconciliationService<S, B>,
    config: ScheduledReconcileConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<ScheduledReconcileMetrics>
where
    S: CacheStore + 'static,
    B: FlowSource + 'static,
{
    let metrics = Arc::new(ScheduledReconcileMetrics::new());

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        configurations = config.configuration_ids.len(),
        "Scheduled reconciliation task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Scheduled reconciliation task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                metrics.cycles.fetch_add(1, Ordering::Relaxed);
                reconcile_configurations(&service, &config.configuration_ids, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        failed_fetches = snapshot.failed_fetches,
        aborted_runs = snapshot.aborted_runs,
        flows_repaired = snapshot.flows_repaired,
        "Scheduled reconciliation task completed"
    );

    metrics
}

/// Reconcile each configuration once, concurrently, and wait for all of
/// them. Used for every scheduled cycle and for the single startup pull.
pub async fn reconcile_configurations<S, B>(
    service: &ReconciliationService<S, B>,
    configuration_ids: &[ScopeId],
    metrics: &ScheduledReconcileMetrics,
) where
    S: CacheStore + 'static,
    B: FlowSource + 'static,
{
    let handles = configuration_ids
        .iter()
        .map(|scope| service.reconcile(FlowQuery::Configuration(scope.clone())));
    let results = join_all(handles.map(|handle| handle.join())).await;

    let mut repaired = 0u64;
    for result in results {
        match result {
            Ok(report) if report.fetch_failed => {
                metrics.failed_fetches.fetch_add(1, Ordering::Relaxed);
            }
            Ok(report) => repaired += report.repaired() as u64,
            Err(e) => {
                tracing::error!(error = %e, "Reconciliation did not complete");
                metrics.aborted_runs.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    metrics.flows_repaired.fetch_add(repaired, Ordering::Relaxed);

    if repaired > 0 {
        tracing::info!(repaired = repaired, "Reconciliation pass completed");
    } else {
        tracing::trace!("Reconciliation pass completed with nothing to repair");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowsync_core::{BackendError, Flow, FlowId};
    use flowsync_storage::{CacheKey, InMemoryCacheStore};

    /// Returns one flow per configuration whose timestamp advances per call.
    struct CountingSource {
        calls: AtomicU64,
        fail_scope: Option<ScopeId>,
    }

    #[async_trait]
    impl FlowSource for CountingSource {
        async fn fetch(&self, query: &FlowQuery) -> Result<Vec<Flow>, BackendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as i64;
            match query {
                FlowQuery::Configuration(scope) if Some(scope) == self.fail_scope.as_ref() => {
                    Err(BackendError::Transport {
                        reason: "connection reset".to_string(),
                    })
                }
                FlowQuery::Configuration(scope) => {
                    let id = scope.as_str().parse::<i64>().unwrap_or_default();
                    Ok(vec![Flow::from_epoch_seconds(
                        FlowId::new(id),
                        1_000 + call,
                        serde_json::Value::Null,
                    )
                    .map_err(|e| BackendError::InvalidResponse {
                        reason: e.to_string(),
                    })?])
                }
                FlowQuery::Flow(_) => Ok(Vec::new()),
            }
        }
    }

    #[test]
    fn test_config_from_service_config() {
        let service_config = ServiceConfig {
            update_schedule_interval: Duration::from_secs(42),
            configuration_ids: vec![ScopeId::from(1)],
            ..ServiceConfig::default()
        };
        let config = ScheduledReconcileConfig::from(&service_config);
        assert_eq!(config.interval, Duration::from_secs(42));
        assert_eq!(config.configuration_ids, vec![ScopeId::from(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_reconciles_until_shutdown() {
        let store = Arc::new(InMemoryCacheStore::new());
        let source = Arc::new(CountingSource {
            calls: AtomicU64::new(0),
            fail_scope: Some(ScopeId::from(2)),
        });
        let service = ReconciliationService::new(Arc::clone(&store), Arc::clone(&source));
        let config = ScheduledReconcileConfig {
            interval: Duration::from_secs(10),
            configuration_ids: vec![ScopeId::from(1), ScopeId::from(2)],
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(scheduled_reconcile_task(service, config, shutdown_rx));

        // First tick fires immediately, then at 10s and 20s.
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(true).unwrap();
        let metrics = task.await.unwrap().snapshot();

        assert_eq!(metrics.cycles, 3);
        assert_eq!(metrics.failed_fetches, 3);
        assert_eq!(metrics.flows_repaired, 3);
        assert_eq!(metrics.aborted_runs, 0);
        assert!(store.contains(&CacheKey::reconciled(FlowId::new(1))));
        assert!(!store.contains(&CacheKey::reconciled(FlowId::new(2))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_stops_when_sender_dropped() {
        let store = Arc::new(InMemoryCacheStore::new());
        let source = Arc::new(CountingSource {
            calls: AtomicU64::new(0),
            fail_scope: None,
        });
        let service = ReconciliationService::new(store, source);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(scheduled_reconcile_task(
            service,
            ScheduledReconcileConfig::default(),
            shutdown_rx,
        ));
        drop(shutdown_tx);

        let metrics = task.await.unwrap().snapshot();
        assert!(metrics.cycles <= 1);
    }

    #[tokio::test]
    async fn test_single_pass_reconciles_each_configuration() {
        let store = Arc::new(InMemoryCacheStore::new());
        let source = Arc::new(CountingSource {
            calls: AtomicU64::new(0),
            fail_scope: Some(ScopeId::from(3)),
        });
        let service = ReconciliationService::new(Arc::clone(&store), Arc::clone(&source));
        let metrics = ScheduledReconcileMetrics::new();

        reconcile_configurations(
            &service,
            &[ScopeId::from(1), ScopeId::from(2), ScopeId::from(3)],
            &metrics,
        )
        .await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 0);
        assert_eq!(snapshot.flows_repaired, 2);
        assert_eq!(snapshot.failed_fetches, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(store.contains(&CacheKey::reconciled(FlowId::new(2))));
    }
}
