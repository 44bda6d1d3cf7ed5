//! Cache layer for flows.
//!
//! The [`CacheStore`] trait is the whole contract the rest of flowsync has
//! with the physical store: get, set, delete one, delete many, and list by
//! prefix. Keys are only ever built through [`CacheKey`], which owns the two
//! key namespaces.
//!
//! # Example
//!
//! ```ignore
//! let store = RedisCacheStore::connect(&RedisConfig::default()).await?;
//! let key = CacheKey::scoped(&ScopeId::from(1), FlowId::new(1));
//! store.set(&key, encode_flow(&flow)?).await?;
//! ```

pub mod codec;
pub mod key;
pub mod memory;
pub mod redis_backend;
pub mod traits;

pub use codec::{decode_flow, encode_flow, read_flow};
pub use key::{CacheKey, KeyPrefix, SEPARATOR};
pub use memory::{InMemoryCacheStore, StoreCallCounts};
pub use redis_backend::{RedisCacheStore, RedisConfig, DEFAULT_SCAN_COUNT};
pub use traits::{CacheStore, StoreResult};
