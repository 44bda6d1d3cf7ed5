//! Reconciliation service.
//!
//! Pulls authoritative flows from a [`FlowSource`] and hands the result to a
//! [`FlowReconciler`]. Each call runs on its own task so callers are never
//! blocked by the backend.

use std::sync::Arc;

use flowsync_storage::{CacheStore, FlowReconciler, ReconcileMetrics, ReconcileReport};
use tokio::task::JoinHandle;

use crate::backend::{FlowQuery, FlowSource};
use crate::error::{ApiError, ApiResult};

/// Handle to one in-flight reconciliation.
///
/// Dropping the handle detaches the task; the work still completes.
#[derive(Debug)]
pub struct ReconcileHandle {
    query: FlowQuery,
    task: JoinHandle<ReconcileReport>,
}

impl ReconcileHandle {
    pub fn query(&self) -> &FlowQuery {
        &self.query
    }

    /// Cancel the reconciliation. Writes already issued are not undone.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the reconciliation to finish.
    pub async fn join(self) -> ApiResult<ReconcileReport> {
        let query = self.query;
        self.task.await.map_err(|e| {
            if e.is_cancelled() {
                ApiError::cancelled(format!("Reconciliation of {} was cancelled", query))
            } else {
                ApiError::internal(format!("Reconciliation of {} panicked: {}", query, e))
            }
        })
    }
}

/// Fetches authoritative flows and repairs the cache.
pub struct ReconciliationService<S: CacheStore, B: FlowSource> {
    reconciler: FlowReconciler<S>,
    source: Arc<B>,
}

impl<S: CacheStore, B: FlowSource> Clone for ReconciliationService<S, B> {
    fn clone(&self) -> Self {
        Self {
            reconciler: self.reconciler.clone(),
            source: Arc::clone(&self.source),
        }
    }
}

impl<S, B> ReconciliationService<S, B>
where
    S: CacheStore + 'static,
    B: FlowSource + 'static,
{
    pub fn new(store: Arc<S>, source: Arc<B>) -> Self {
        Self::with_reconciler(FlowReconciler::new(store), source)
    }

    pub fn with_reconciler(reconciler: FlowReconciler<S>, source: Arc<B>) -> Self {
        Self { reconciler, source }
    }

    pub fn metrics(&self) -> &Arc<ReconcileMetrics> {
        self.reconciler.metrics()
    }

    /// Start reconciling the flows matching `query`.
    ///
    /// Returns immediately. The spawned task performs the fetch and then the
    /// callback; a failed fetch goes to the callback's failure branch.
    pub fn reconcile(&self, query: FlowQuery) -> ReconcileHandle {
        let reconciler = self.reconciler.clone();
        let source = Arc::clone(&self.source);
        let task_query = query.clone();

        let task = tokio::spawn(async move {
            tracing::debug!(query = %task_query, "Fetching authoritative flows");
            let result = source.fetch(&task_query).await;
            reconciler.complete(result).await
        });

        ReconcileHandle { query, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowsync_core::{BackendError, Flow, FlowId};
    use flowsync_storage::{CacheKey, InMemoryCacheStore};
    use std::time::Duration;

    struct StaticSource {
        flows: Vec<Flow>,
        delay: Duration,
    }

    #[async_trait]
    impl FlowSource for StaticSource {
        async fn fetch(&self, _query: &FlowQuery) -> Result<Vec<Flow>, BackendError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.flows.clone())
        }
    }

    fn flow(id: i64, secs: i64) -> Flow {
        Flow::from_epoch_seconds(FlowId::new(id), secs, serde_json::Value::Null).unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_runs_callback() {
        let store = Arc::new(InMemoryCacheStore::new());
        let source = Arc::new(StaticSource {
            flows: vec![flow(1, 10), flow(2, 20)],
            delay: Duration::ZERO,
        });
        let service = ReconciliationService::new(Arc::clone(&store), source);

        let handle = service.reconcile(FlowQuery::Flow(FlowId::new(1)));
        assert_eq!(handle.query(), &FlowQuery::Flow(FlowId::new(1)));
        let report = handle.join().await.unwrap();

        assert_eq!(report.inserted, 2);
        assert!(store.contains(&CacheKey::reconciled(FlowId::new(2))));
        assert_eq!(service.metrics().snapshot().flows_inserted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_cancels_before_any_write() {
        let store = Arc::new(InMemoryCacheStore::new());
        let source = Arc::new(StaticSource {
            flows: vec![flow(1, 10)],
            delay: Duration::from_secs(60),
        });
        let service = ReconciliationService::new(Arc::clone(&store), source);

        let handle = service.reconcile(FlowQuery::Flow(FlowId::new(1)));
        handle.abort();
        let err = handle.join().await.unwrap_err();

        assert_eq!(err.code, crate::error::ErrorCode::Cancelled);
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_still_completes() {
        let store = Arc::new(InMemoryCacheStore::new());
        let source = Arc::new(StaticSource {
            flows: vec![flow(1, 10)],
            delay: Duration::from_millis(10),
        });
        let service = ReconciliationService::new(Arc::clone(&store), source);

        drop(service.reconcile(FlowQuery::Flow(FlowId::new(1))));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.contains(&CacheKey::reconciled(FlowId::new(1))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_completion() {
        let store = Arc::new(InMemoryCacheStore::new());
        let source = Arc::new(StaticSource {
            flows: vec![flow(1, 10)],
            delay: Duration::from_millis(10),
        });
        let service = ReconciliationService::new(store, source);

        let handle = service.reconcile(FlowQuery::Flow(FlowId::new(1)));
        assert!(!handle.is_finished());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
        assert_eq!(handle.join().await.unwrap().inserted, 1);
    }
}
