//! Staleness rule for cached flows.
//!
//! A cached flow is current only when its `last_updated` marker is exactly
//! the authoritative one. Ordering is deliberately ignored: a cached copy
//! with a different timestamp, newer or older, is stale and gets replaced.

use crate::Flow;

/// Returns true if `cached` matches the `authoritative` flow's timestamp.
pub fn is_current(cached: &Flow, authoritative: &Flow) -> bool {
    cached.last_updated == authoritative.last_updated
}
