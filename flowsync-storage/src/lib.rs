//! flowsync Storage - Cache Store, Batch Mutation and Reconciliation
//!
//! Everything that touches the flow cache lives here. The gRPC layer in
//! `flowsync-api` only translates requests into calls on these types.

pub mod batch;
pub mod cache;
pub mod reconcile;

pub use batch::FlowCacheService;
pub use cache::{
    decode_flow, encode_flow, read_flow, CacheKey, CacheStore, InMemoryCacheStore, KeyPrefix,
    RedisCacheStore, RedisConfig, StoreCallCounts, StoreResult,
};
pub use reconcile::{
    FlowOutcome, FlowReconciler, ReconcileMetrics, ReconcileMetricsSnapshot, ReconcileReport,
};
