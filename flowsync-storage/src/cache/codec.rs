//! JSON encoding of flows as cache values.

use flowsync_core::{Flow, StoreError};

use super::key::CacheKey;
use super::traits::{CacheStore, StoreResult};

/// Serialize a flow for storage.
pub fn encode_flow(flow: &Flow) -> StoreResult<String> {
    serde_json::to_string(flow).map_err(|e| StoreError::Encode {
        flow_id: flow.flow_id.as_i64(),
        reason: e.to_string(),
    })
}

/// Deserialize a stored flow.
///
/// A value that does not decode is treated as absent: the failure is logged
/// and the caller sees `None`, so the next write repairs the entry.
pub fn decode_flow(key: &CacheKey, raw: &str) -> Option<Flow> {
    match serde_json::from_str::<Flow>(raw) {
        Ok(flow) => Some(flow),
        Err(e) => {
            tracing::warn!(
                key = %key,
                error = %e,
                "Cached flow could not be decoded, treating entry as absent"
            );
            None
        }
    }
}

/// Read and decode the flow stored under `key`.
pub async fn read_flow<S>(store: &S, key: &CacheKey) -> StoreResult<Option<Flow>>
where
    S: CacheStore + ?Sized,
{
    let raw = store.get(key).await?;
    Ok(raw.and_then(|value| decode_flow(key, &value)))
}
