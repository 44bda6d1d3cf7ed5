//! flowsync Test Utilities
//!
//! Centralized test infrastructure for the flowsync workspace:
//! - Proptest generators for flows and identifiers
//! - Test fixtures for common cache states
//! - Custom assertions for cache contents and error variants

// Re-export the in-memory store from its source crate
pub use flowsync_storage::{CacheKey, InMemoryCacheStore, StoreCallCounts};

// Re-export core types for convenience
pub use flowsync_core::{
    BackendError, ConfigError, Flow, FlowId, FlowsyncError, FlowsyncResult, ScopeId, StoreError,
    Timestamp, ValidationError,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating flowsync types.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Generate any FlowId.
    pub fn arb_flow_id() -> impl Strategy<Value = FlowId> {
        any::<i64>().prop_map(FlowId::new)
    }

    /// Generate a ScopeId, either numeric or a valid string token.
    pub fn arb_scope_id() -> impl Strategy<Value = ScopeId> {
        prop_oneof![
            any::<i64>().prop_map(ScopeId::from),
            "[a-z][a-z0-9_-]{0,15}".prop_filter_map("reserved scope token", |s| {
                ScopeId::parse(s).ok()
            }),
        ]
    }

    /// Generate a whole-second Timestamp.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default()
        })
    }

    /// Generate a small JSON definition.
    pub fn arb_definition() -> impl Strategy<Value = serde_json::Value> {
        prop_oneof![
            Just(serde_json::Value::Null),
            ("[a-z]{1,10}", any::<i32>())
                .prop_map(|(name, steps)| serde_json::json!({ "name": name, "steps": steps })),
        ]
    }

    /// Generate a Flow with the given id.
    pub fn arb_flow_with_id(flow_id: FlowId) -> impl Strategy<Value = Flow> {
        (arb_timestamp(), arb_definition())
            .prop_map(move |(ts, definition)| Flow::new(flow_id, ts, definition))
    }

    /// Generate a Flow.
    pub fn arb_flow() -> impl Strategy<Value = Flow> {
        arb_flow_id().prop_flat_map(arb_flow_with_id)
    }

    /// Generate up to `max` flows with distinct ids.
    pub fn arb_flows(max: usize) -> impl Strategy<Value = Vec<Flow>> {
        prop::collection::btree_map(any::<i64>(), (arb_timestamp(), arb_definition()), 0..=max)
            .prop_map(|flows: BTreeMap<i64, (Timestamp, serde_json::Value)>| {
                flows
                    .into_iter()
                    .map(|(id, (ts, definition))| Flow::new(FlowId::new(id), ts, definition))
                    .collect()
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    /// Fixed reference instant (2023-11-14T22:13:20Z).
    pub const T1: i64 = 1_700_000_000;

    /// A later instant than [`T1`].
    pub const T2: i64 = 1_700_003_600;

    /// Definition used by fixture flows.
    pub fn sample_definition(flow_id: i64) -> serde_json::Value {
        serde_json::json!({
            "name": format!("flow-{}", flow_id),
            "steps": [{"type": "start"}, {"type": "end"}],
        })
    }

    /// A flow updated at `epoch_secs`.
    ///
    /// # Panics
    /// Panics if `epoch_secs` is outside the representable range.
    pub fn flow_at(flow_id: i64, epoch_secs: i64) -> Flow {
        Flow::from_epoch_seconds(FlowId::new(flow_id), epoch_secs, sample_definition(flow_id))
            .unwrap_or_else(|e| panic!("fixture timestamp out of range: {}", e))
    }

    /// An empty shared store.
    pub fn empty_store() -> Arc<InMemoryCacheStore> {
        Arc::new(InMemoryCacheStore::new())
    }

    /// A shared store holding `flows` under their reconciliation keys.
    pub fn store_with_reconciled(flows: &[Flow]) -> Arc<InMemoryCacheStore> {
        let store = empty_store();
        for flow in flows {
            store
                .seed_flow(&CacheKey::reconciled(flow.flow_id), flow)
                .unwrap_or_else(|e| panic!("failed to seed flow {}: {}", flow.flow_id, e));
        }
        store
    }

    /// A shared store holding `flows` under `{scope}:{flow_id}`.
    pub fn store_with_scope(scope: &ScopeId, flows: &[Flow]) -> Arc<InMemoryCacheStore> {
        let store = empty_store();
        for flow in flows {
            store
                .seed_flow(&CacheKey::scoped(scope, flow.flow_id), flow)
                .unwrap_or_else(|e| panic!("failed to seed flow {}: {}", flow.flow_id, e));
        }
        store
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for flowsync-specific validation.

    use super::*;

    /// Assert that `key` holds exactly `expected`.
    #[track_caller]
    pub fn assert_cached(store: &InMemoryCacheStore, key: &CacheKey, expected: &Flow) {
        match store.flow(key) {
            Some(actual) => assert_eq!(&actual, expected, "Wrong flow cached under {}", key),
            None => panic!("Expected {} to hold flow {}, found nothing", key, expected.flow_id),
        }
    }

    /// Assert that `key` is not present.
    #[track_caller]
    pub fn assert_absent(store: &InMemoryCacheStore, key: &CacheKey) {
        assert!(
            !store.contains(key),
            "Expected {} to be absent, found {:?}",
            key,
            store.value(key)
        );
    }

    /// Assert that the store has not served any mutating call.
    #[track_caller]
    pub fn assert_no_mutations(store: &InMemoryCacheStore) {
        let calls = store.calls();
        assert_eq!(calls.mutations(), 0, "Expected no mutations, got {:?}", calls);
    }

    /// Assert that the store has not been called at all.
    #[track_caller]
    pub fn assert_untouched(store: &InMemoryCacheStore) {
        let calls = store.calls();
        assert_eq!(calls.total(), 0, "Expected no store calls, got {:?}", calls);
    }

    /// Assert that a FlowsyncResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &FlowsyncResult<T>) {
        match result {
            Err(FlowsyncError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a FlowsyncResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &FlowsyncResult<T>) {
        match result {
            Err(FlowsyncError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::assertions::*;
    use super::fixtures::*;
    use super::generators::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fixture_store_with_reconciled() {
        let flow = flow_at(7, T1);
        let store = store_with_reconciled(std::slice::from_ref(&flow));
        assert_cached(&store, &CacheKey::reconciled(flow.flow_id), &flow);
        assert_untouched(&store);
    }

    #[test]
    fn test_fixture_instants_differ() {
        assert_ne!(flow_at(1, T1).last_updated, flow_at(1, T2).last_updated);
    }

    #[test]
    fn test_fixture_flow_carries_sample_definition() {
        let flow = flow_at(3, T1);
        assert_eq!(flow.definition, sample_definition(3));
        assert_ne!(sample_definition(3), sample_definition(4));
    }

    #[test]
    fn test_error_variant_assertions() {
        let rejected: FlowsyncResult<ScopeId> = ScopeId::parse("").map_err(FlowsyncError::from);
        assert_validation_error(&rejected);

        let missing: FlowsyncResult<()> = Err(ConfigError::MissingRequired {
            field: "FLOWSYNC_BACKEND_URL".to_string(),
        }
        .into());
        assert_config_error(&missing);
    }

    #[test]
    #[should_panic(expected = "Expected Config error")]
    fn test_config_assertion_rejects_other_variants() {
        let rejected: FlowsyncResult<ScopeId> = ScopeId::parse("a b").map_err(FlowsyncError::from);
        assert_config_error(&rejected);
    }

    proptest! {
        #[test]
        fn prop_arb_flows_have_distinct_ids(flows in arb_flows(16)) {
            let mut ids: Vec<FlowId> = flows.iter().map(|f| f.flow_id).collect();
            ids.dedup();
            prop_assert_eq!(ids.len(), flows.len());
        }

        #[test]
        fn prop_arb_timestamps_are_whole_seconds(ts in arb_timestamp()) {
            prop_assert_eq!(ts.timestamp_subsec_nanos(), 0);
        }

        #[test]
        fn prop_scoped_keys_stay_outside_reconciled_namespace(
            scope in arb_scope_id(),
            flow_id in arb_flow_id(),
        ) {
            let key = CacheKey::scoped(&scope, flow_id);
            prop_assert_eq!(key.flow_id(), Some(flow_id));
            prop_assert!(!key.is_reconciled());
            prop_assert!(CacheKey::scope_prefix(&scope).flow_id_of(&key).is_some());
        }

        #[test]
        fn prop_arb_flow_with_id_keeps_id(
            (flow_id, flow) in arb_flow_id().prop_flat_map(|id| (Just(id), arb_flow_with_id(id)))
        ) {
            prop_assert_eq!(flow.flow_id, flow_id);
        }

        #[test]
        fn prop_arb_flow_seeds_under_its_own_key(flow in arb_flow()) {
            let store = store_with_reconciled(std::slice::from_ref(&flow));
            assert_cached(&store, &CacheKey::reconciled(flow.flow_id), &flow);
        }
    }
}
