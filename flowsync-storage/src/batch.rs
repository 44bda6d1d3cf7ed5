//! Batch mutation of scoped cache entries.
//!
//! This is the push path: the configuration endpoint hands over a scope and
//! a list of flows, and [`FlowCacheService`] turns them into per-key store
//! operations under `{scope}:{flow_id}`. Every operation collapses to a
//! single `bool`. Store errors are logged here and never returned.

use std::collections::BTreeSet;
use std::sync::Arc;

use flowsync_core::{Flow, FlowId, ScopeId};
use futures_util::future::join_all;

use crate::cache::{encode_flow, CacheKey, CacheStore};

/// Writes and deletes flows of one scope against a [`CacheStore`].
///
/// `true` from any method certifies that every member operation was
/// acknowledged by the store. Nothing is retried and nothing is rolled back.
pub struct FlowCacheService<S: CacheStore> {
    store: Arc<S>,
}

impl<S: CacheStore> Clone for FlowCacheService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CacheStore> FlowCacheService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Write one flow under `{scope}:{flow_id}`.
    pub async fn update_one(&self, scope: &ScopeId, flow: &Flow) -> bool {
        let key = CacheKey::scoped(scope, flow.flow_id);
        let value = match encode_flow(flow) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode flow");
                return false;
            }
        };

        match self.store.set(&key, value).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Flow written");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to write flow");
                false
            }
        }
    }

    /// Write every flow concurrently.
    ///
    /// Returns only after all writes have resolved, slow ones included. An
    /// empty list is a vacuous success and touches nothing.
    pub async fn update_many(&self, scope: &ScopeId, flows: &[Flow]) -> bool {
        if flows.is_empty() {
            tracing::debug!(scope = %scope, "No flows to update");
            return true;
        }

        let outcomes = join_all(flows.iter().map(|flow| self.update_one(scope, flow))).await;
        let failed = outcomes.iter().filter(|written| !**written).count();

        if failed > 0 {
            tracing::warn!(
                scope = %scope,
                failed = failed,
                total = flows.len(),
                "Batch update incomplete"
            );
            return false;
        }

        tracing::debug!(scope = %scope, written = flows.len(), "Batch update complete");
        true
    }

    /// Delete one flow. True iff exactly one key was removed.
    pub async fn delete_one(&self, scope: &ScopeId, flow_id: FlowId) -> bool {
        let key = CacheKey::scoped(scope, flow_id);
        match self.store.delete(&key).await {
            Ok(1) => true,
            Ok(removed) => {
                tracing::debug!(key = %key, removed = removed, "Flow to delete was not cached");
                false
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to delete flow");
                false
            }
        }
    }

    /// Delete the given flows in one batched store call.
    pub async fn delete_many(&self, scope: &ScopeId, flows: &[Flow]) -> bool {
        let flow_ids: Vec<FlowId> = flows.iter().map(|flow| flow.flow_id).collect();
        self.delete_flow_ids(scope, &flow_ids).await
    }

    /// Delete flows by id in one batched store call.
    ///
    /// Duplicate ids count once. True iff the store removed exactly as many
    /// keys as were requested; a partial delete is not undone.
    pub async fn delete_flow_ids(&self, scope: &ScopeId, flow_ids: &[FlowId]) -> bool {
        let keys: BTreeSet<CacheKey> = flow_ids
            .iter()
            .map(|flow_id| CacheKey::scoped(scope, *flow_id))
            .collect();
        if keys.is_empty() {
            tracing::debug!(scope = %scope, "No flows to delete");
            return true;
        }

        let keys: Vec<CacheKey> = keys.into_iter().collect();
        match self.store.delete_many(&keys).await {
            Ok(removed) if removed == keys.len() as u64 => true,
            Ok(removed) => {
                tracing::warn!(
                    scope = %scope,
                    requested = keys.len(),
                    removed = removed,
                    "Batch delete removed fewer keys than requested"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    scope = %scope,
                    requested = keys.len(),
                    error = %e,
                    "Batch delete failed"
                );
                false
            }
        }
    }

    /// Replace every cached flow of `scope` with `flows`.
    ///
    /// Runs in two phases: delete the keys currently listed for the scope,
    /// then [`update_many`](Self::update_many). Readers may observe the scope
    /// empty between the phases. Delete-phase failures are logged and the
    /// insert phase runs anyway; the return value is the insert outcome.
    pub async fn overwrite_scope(&self, scope: &ScopeId, flows: &[Flow]) -> bool {
        let prefix = CacheKey::scope_prefix(scope);

        match self.store.list_keys(&prefix).await {
            Ok(listed) => {
                let existing: Vec<CacheKey> = listed
                    .into_iter()
                    .filter(|key| prefix.flow_id_of(key).is_some())
                    .collect();

                if !existing.is_empty() {
                    match self.store.delete_many(&existing).await {
                        Ok(removed) => tracing::debug!(
                            scope = %scope,
                            removed = removed,
                            "Cleared scope before overwrite"
                        ),
                        Err(e) => tracing::warn!(
                            scope = %scope,
                            error = %e,
                            "Failed to clear scope, inserting anyway"
                        ),
                    }
                }
            }
            Err(e) => tracing::warn!(
                scope = %scope,
                error = %e,
                "Failed to list scope keys, inserting anyway"
            ),
        }

        self.update_many(scope, flows).await
    }
}
