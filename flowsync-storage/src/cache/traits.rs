//! Cache store trait.
//!
//! The store is the only durable holder of flow state. Components receive a
//! handle in their constructor; there is no global connection.

use async_trait::async_trait;
use flowsync_core::StoreError;

use super::key::{CacheKey, KeyPrefix};

/// Result type for cache store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store holding serialized flows.
///
/// Implementations must be safe for concurrent use: the push path and the
/// reconciliation path read and write through the same handle at the same
/// time.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the raw value stored under `key`.
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>>;

    /// Write `value` under `key`. `Ok(())` means the store acknowledged it.
    async fn set(&self, key: &CacheKey, value: String) -> StoreResult<()>;

    /// Delete one key, returning how many keys were removed (0 or 1).
    async fn delete(&self, key: &CacheKey) -> StoreResult<u64>;

    /// Delete all `keys` in one batched operation, returning how many were
    /// removed. Keys that did not exist count as zero.
    async fn delete_many(&self, keys: &[CacheKey]) -> StoreResult<u64>;

    /// List every key starting with `prefix`.
    async fn list_keys(&self, prefix: &KeyPrefix) -> StoreResult<Vec<CacheKey>>;
}
