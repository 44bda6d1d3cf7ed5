//! In-memory cache store with fault injection.
//!
//! Stands in for Redis in tests. Besides plain storage it can fail or delay
//! individual writes, refuse every operation, and counts the calls it
//! receives so tests can assert how many store operations a component made.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use flowsync_core::{Flow, StoreError};

use super::codec::{decode_flow, encode_flow};
use super::key::{CacheKey, KeyPrefix};
use super::traits::{CacheStore, StoreResult};

/// Snapshot of the calls an [`InMemoryCacheStore`] has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    pub batch_deletes: u64,
    pub listings: u64,
}

impl StoreCallCounts {
    /// Total number of store operations.
    pub fn total(&self) -> u64 {
        self.gets + self.sets + self.deletes + self.batch_deletes + self.listings
    }

    /// Number of mutating operations.
    pub fn mutations(&self) -> u64 {
        self.sets + self.deletes + self.batch_deletes
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    batch_deletes: AtomicU64,
    listings: AtomicU64,
}

#[derive(Debug, Default)]
struct FaultPlan {
    unavailable: bool,
    failing_writes: HashSet<String>,
    write_delays: HashMap<String, Duration>,
    failing_listings: bool,
}

/// Thread-safe in-memory [`CacheStore`].
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, String>>,
    faults: Mutex<FaultPlan>,
    calls: CallCounters,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Seeding and inspection (bypass call counters)
    // ------------------------------------------------------------------

    /// Store a raw value without counting a call.
    pub fn insert_raw(&self, key: &CacheKey, value: impl Into<String>) {
        self.write_entries().insert(key.as_str().to_string(), value.into());
    }

    /// Store an encoded flow without counting a call.
    pub fn seed_flow(&self, key: &CacheKey, flow: &Flow) -> StoreResult<()> {
        let value = encode_flow(flow)?;
        self.insert_raw(key, value);
        Ok(())
    }

    /// Raw value currently stored under `key`.
    pub fn value(&self, key: &CacheKey) -> Option<String> {
        self.read_entries().get(key.as_str()).cloned()
    }

    /// Decoded flow currently stored under `key`.
    pub fn flow(&self, key: &CacheKey) -> Option<Flow> {
        self.value(key).and_then(|raw| decode_flow(key, &raw))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.read_entries().contains_key(key.as_str())
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read_entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn clear(&self) {
        self.write_entries().clear();
    }

    /// Calls served so far.
    pub fn calls(&self) -> StoreCallCounts {
        StoreCallCounts {
            gets: self.calls.gets.load(Ordering::SeqCst),
            sets: self.calls.sets.load(Ordering::SeqCst),
            deletes: self.calls.deletes.load(Ordering::SeqCst),
            batch_deletes: self.calls.batch_deletes.load(Ordering::SeqCst),
            listings: self.calls.listings.load(Ordering::SeqCst),
        }
    }

    pub fn reset_calls(&self) {
        self.calls.gets.store(0, Ordering::SeqCst);
        self.calls.sets.store(0, Ordering::SeqCst);
        self.calls.deletes.store(0, Ordering::SeqCst);
        self.calls.batch_deletes.store(0, Ordering::SeqCst);
        self.calls.listings.store(0, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Make every operation fail with a connection error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults().unavailable = unavailable;
    }

    /// Make writes to `key` fail.
    pub fn fail_writes_to(&self, key: &CacheKey) {
        self.faults().failing_writes.insert(key.as_str().to_string());
    }

    /// Delay writes to `key` by `delay` before they are applied (or fail).
    pub fn delay_writes_to(&self, key: &CacheKey, delay: Duration) {
        self.faults()
            .write_delays
            .insert(key.as_str().to_string(), delay);
    }

    /// Make key listing fail.
    pub fn fail_listings(&self, failing: bool) {
        self.faults().failing_listings = failing;
    }

    /// Remove all injected faults.
    pub fn heal(&self) {
        *self.faults() = FaultPlan::default();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(|err| err.into_inner())
    }

    fn faults(&self) -> MutexGuard<'_, FaultPlan> {
        self.faults.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.faults().unavailable {
            return Err(StoreError::Connection {
                reason: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.read_entries().get(key.as_str()).cloned())
    }

    async fn set(&self, key: &CacheKey, value: String) -> StoreResult<()> {
        self.calls.sets.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let (delay, failing) = {
            let faults = self.faults();
            (
                faults.write_delays.get(key.as_str()).copied(),
                faults.failing_writes.contains(key.as_str()),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(StoreError::Command {
                command: "SET",
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            });
        }

        self.write_entries().insert(key.as_str().to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> StoreResult<u64> {
        self.calls.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(u64::from(self.write_entries().remove(key.as_str()).is_some()))
    }

    async fn delete_many(&self, keys: &[CacheKey]) -> StoreResult<u64> {
        self.calls.batch_deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut entries = self.write_entries();
        let removed = keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn list_keys(&self, prefix: &KeyPrefix) -> StoreResult<Vec<CacheKey>> {
        self.calls.listings.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        if self.faults().failing_listings {
            return Err(StoreError::Command {
                command: "SCAN",
                key: prefix.to_string(),
                reason: "injected listing failure".to_string(),
            });
        }
        let mut keys: Vec<CacheKey> = self
            .read_entries()
            .keys()
            .filter(|key| key.starts_with(prefix.as_str()))
            .cloned()
            .map(CacheKey::from_stored)
            .collect();
        keys.sort();
        Ok(keys)
    }
}
