//! Reconciliation callback.
//!
//! Receives the outcome of a backend fetch and repairs the `flow:{flow_id}`
//! entries that diverge from the authoritative copies. Failures are logged
//! and counted, never returned to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flowsync_core::{is_current, BackendError, Flow};
use futures_util::future::join_all;

use crate::cache::{encode_flow, read_flow, CacheKey, CacheStore};

// ============================================================================
// OUTCOMES
// ============================================================================

/// What reconciliation did for one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// No cached copy existed; the authoritative flow was written.
    Inserted,
    /// The cached copy had a different timestamp and was replaced.
    Overwritten,
    /// The cached copy was current.
    Unchanged,
    /// The lookup or the write failed.
    Failed,
}

/// Tally of one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub overwritten: usize,
    pub unchanged: usize,
    pub errors: usize,
    /// The backend fetch itself failed; no flow was examined.
    pub fetch_failed: bool,
}

impl ReconcileReport {
    /// Report for a run whose backend fetch failed.
    pub fn fetch_failure() -> Self {
        Self {
            fetch_failed: true,
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: FlowOutcome) {
        match outcome {
            FlowOutcome::Inserted => self.inserted += 1,
            FlowOutcome::Overwritten => self.overwritten += 1,
            FlowOutcome::Unchanged => self.unchanged += 1,
            FlowOutcome::Failed => self.errors += 1,
        }
    }

    /// Number of flows examined.
    pub fn examined(&self) -> usize {
        self.inserted + self.overwritten + self.unchanged + self.errors
    }

    /// Number of cache writes performed.
    pub fn repaired(&self) -> usize {
        self.inserted + self.overwritten
    }

    /// Returns true if neither the fetch nor any flow failed.
    pub fn is_clean(&self) -> bool {
        !self.fetch_failed && self.errors == 0
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters for reconciliation activity since startup.
#[derive(Debug, Default)]
pub struct ReconcileMetrics {
    pub flows_inserted: AtomicU64,
    pub flows_overwritten: AtomicU64,
    pub flows_unchanged: AtomicU64,
    pub flow_errors: AtomicU64,
    /// Backend fetches that failed.
    pub fetch_failures: AtomicU64,
    /// Callback invocations, successful or not.
    pub runs: AtomicU64,
}

impl ReconcileMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> ReconcileMetricsSnapshot {
        ReconcileMetricsSnapshot {
            flows_inserted: self.flows_inserted.load(Ordering::Relaxed),
            flows_overwritten: self.flows_overwritten.load(Ordering::Relaxed),
            flows_unchanged: self.flows_unchanged.load(Ordering::Relaxed),
            flow_errors: self.flow_errors.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
        }
    }

    fn record(&self, outcome: FlowOutcome) {
        let counter = match outcome {
            FlowOutcome::Inserted => &self.flows_inserted,
            FlowOutcome::Overwritten => &self.flows_overwritten,
            FlowOutcome::Unchanged => &self.flows_unchanged,
            FlowOutcome::Failed => &self.flow_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of reconciliation metrics at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileMetricsSnapshot {
    pub flows_inserted: u64,
    pub flows_overwritten: u64,
    pub flows_unchanged: u64,
    pub flow_errors: u64,
    pub fetch_failures: u64,
    pub runs: u64,
}

// ============================================================================
// CALLBACK
// ============================================================================

/// Applies authoritative flows to the reconciliation namespace.
pub struct FlowReconciler<S: CacheStore> {
    store: Arc<S>,
    metrics: Arc<ReconcileMetrics>,
}

impl<S: CacheStore> Clone for FlowReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<S: CacheStore> FlowReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_metrics(store, Arc::new(ReconcileMetrics::new()))
    }

    /// Create a reconciler that reports into shared metrics.
    pub fn with_metrics(store: Arc<S>, metrics: Arc<ReconcileMetrics>) -> Self {
        Self { store, metrics }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<ReconcileMetrics> {
        &self.metrics
    }

    /// Handle the result of a backend fetch.
    pub async fn complete(&self, result: Result<Vec<Flow>, BackendError>) -> ReconcileReport {
        match result {
            Ok(flows) => self.on_success(&flows).await,
            Err(e) => self.on_failure(&e),
        }
    }

    /// Reconcile every returned flow concurrently.
    pub async fn on_success(&self, flows: &[Flow]) -> ReconcileReport {
        self.metrics.runs.fetch_add(1, Ordering::Relaxed);

        let outcomes = join_all(flows.iter().map(|flow| self.reconcile_flow(flow))).await;

        let mut report = ReconcileReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }

        if report.repaired() > 0 || report.errors > 0 {
            tracing::info!(
                inserted = report.inserted,
                overwritten = report.overwritten,
                unchanged = report.unchanged,
                errors = report.errors,
                "Reconciliation run completed"
            );
        } else {
            tracing::debug!(
                unchanged = report.unchanged,
                "Reconciliation run completed with no divergence"
            );
        }
        report
    }

    /// Record a failed backend fetch. The cache is left untouched.
    pub fn on_failure(&self, error: &BackendError) -> ReconcileReport {
        self.metrics.runs.fetch_add(1, Ordering::Relaxed);
        self.metrics.fetch_failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            code = error.status_code(),
            description = error.description(),
            "Failed to fetch flows from backend"
        );
        ReconcileReport::fetch_failure()
    }

    /// Compare one authoritative flow with its cached copy and repair it.
    pub async fn reconcile_flow(&self, flow: &Flow) -> FlowOutcome {
        let key = CacheKey::reconciled(flow.flow_id);

        let outcome = match read_flow(self.store.as_ref(), &key).await {
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read cached flow");
                FlowOutcome::Failed
            }
            Ok(None) => {
                if self.write(&key, flow).await {
                    tracing::info!(
                        key = %key,
                        last_updated = flow.last_updated_epoch_seconds(),
                        "flow inserted, was absent"
                    );
                    FlowOutcome::Inserted
                } else {
                    FlowOutcome::Failed
                }
            }
            Ok(Some(cached)) if is_current(&cached, flow) => {
                tracing::trace!(key = %key, "Cached flow is current");
                FlowOutcome::Unchanged
            }
            Ok(Some(cached)) => {
                if self.write(&key, flow).await {
                    tracing::info!(
                        key = %key,
                        cached_last_updated = cached.last_updated_epoch_seconds(),
                        last_updated = flow.last_updated_epoch_seconds(),
                        "flow was stale, overwritten"
                    );
                    FlowOutcome::Overwritten
                } else {
                    FlowOutcome::Failed
                }
            }
        };

        self.metrics.record(outcome);
        outcome
    }

    async fn write(&self, key: &CacheKey, flow: &Flow) -> bool {
        let value = match encode_flow(flow) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode flow");
                return false;
            }
        };
        match self.store.set(key, value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to write reconciled flow");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use flowsync_core::FlowId;
    use serde_json::json;

    fn flow(id: i64, secs: i64) -> Flow {
        Flow::from_epoch_seconds(FlowId::new(id), secs, json!({"rev": secs})).unwrap()
    }

    fn reconciler() -> (Arc<InMemoryCacheStore>, FlowReconciler<InMemoryCacheStore>) {
        let store = Arc::new(InMemoryCacheStore::new());
        (Arc::clone(&store), FlowReconciler::new(store))
    }

    #[tokio::test]
    async fn test_absent_flow_is_inserted_once() {
        let (store, reconciler) = reconciler();
        let report = reconciler.on_success(&[flow(7, 100)]).await;

        assert_eq!(report.inserted, 1);
        assert_eq!(store.calls().sets, 1);
        assert_eq!(store.flow(&CacheKey::reconciled(FlowId::new(7))), Some(flow(7, 100)));
    }

    #[tokio::test]
    async fn test_stale_flow_is_overwritten_once() {
        let (store, reconciler) = reconciler();
        let key = CacheKey::reconciled(FlowId::new(7));
        store.seed_flow(&key, &flow(7, 100)).unwrap();

        let report = reconciler.on_success(&[flow(7, 200)]).await;
        assert_eq!(report.overwritten, 1);
        assert_eq!(store.calls().sets, 1);
        assert_eq!(store.flow(&key), Some(flow(7, 200)));
    }

    #[tokio::test]
    async fn test_newer_cached_flow_is_still_stale() {
        let (store, reconciler) = reconciler();
        let key = CacheKey::reconciled(FlowId::new(7));
        store.seed_flow(&key, &flow(7, 300)).unwrap();

        let report = reconciler.on_success(&[flow(7, 200)]).await;
        assert_eq!(report.overwritten, 1);
        assert_eq!(store.flow(&key), Some(flow(7, 200)));
    }

    #[tokio::test]
    async fn test_current_flow_is_left_alone() {
        let (store, reconciler) = reconciler();
        let key = CacheKey::reconciled(FlowId::new(7));
        store.seed_flow(&key, &flow(7, 100)).unwrap();

        let report = reconciler.on_success(&[flow(7, 100)]).await;
        assert_eq!(report.unchanged, 1);
        assert_eq!(store.calls().sets, 0);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_replaced() {
        let (store, reconciler) = reconciler();
        let key = CacheKey::reconciled(FlowId::new(7));
        store.insert_raw(&key, "{garbage");

        let report = reconciler.on_success(&[flow(7, 100)]).await;
        assert_eq!(report.inserted, 1);
        assert_eq!(store.flow(&key), Some(flow(7, 100)));
    }

    #[tokio::test]
    async fn test_write_failure_is_counted_not_propagated() {
        let (store, reconciler) = reconciler();
        store.fail_writes_to(&CacheKey::reconciled(FlowId::new(2)));

        let report = reconciler.on_success(&[flow(1, 10), flow(2, 20)]).await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.errors, 1);
        assert!(!report.is_clean());
        assert_eq!(reconciler.metrics().snapshot().flow_errors, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_cache_untouched() {
        let (store, reconciler) = reconciler();
        let report = reconciler
            .complete(Err(BackendError::Transport {
                reason: "connection refused".to_string(),
            }))
            .await;

        assert!(report.fetch_failed);
        assert_eq!(report.examined(), 0);
        assert_eq!(store.calls().total(), 0);

        let snapshot = reconciler.metrics().snapshot();
        assert_eq!(snapshot.fetch_failures, 1);
        assert_eq!(snapshot.runs, 1);
    }

    #[tokio::test]
    async fn test_scoped_entries_are_not_consulted() {
        let (store, reconciler) = reconciler();
        let scoped = CacheKey::scoped(&flowsync_core::ScopeId::from(1), FlowId::new(7));
        store.seed_flow(&scoped, &flow(7, 100)).unwrap();

        let report = reconciler.on_success(&[flow(7, 100)]).await;
        assert_eq!(report.inserted, 1);
        assert_eq!(store.flow(&scoped), Some(flow(7, 100)));
    }
}
