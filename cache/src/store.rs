//! The store abstraction shared by the eviction variants.

use crate::ByteView;
use std::time::Duration;

/// Callback invoked once per evicted or expired entry, after the entry
/// has been unlinked and byte accounting updated.
pub type EvictionCallback = Box<dyn Fn(&str, &ByteView) + Send + Sync>;

/// A bounded key→bytes store with a fixed eviction discipline.
///
/// Implementations are single-threaded; [`SyncCache`](crate::SyncCache)
/// provides the locking. `get` takes `&mut self` because a hit updates
/// the order metadata (recency position or access frequency).
pub trait Store: Send + Sync {
    /// Insert or update an entry with the given time-to-live, then evict
    /// while over the byte budget.
    fn add(&mut self, key: &str, value: ByteView, ttl: Duration);

    /// Look up an entry. An entry observed past its expiry is removed and
    /// reported as a miss.
    fn get(&mut self, key: &str) -> Option<ByteView>;

    /// Evict one entry according to the store's discipline. No-op when
    /// empty.
    fn remove_oldest(&mut self);

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Bytes currently accounted for (`len(key) + len(value)` per entry).
    fn used_bytes(&self) -> u64;

    /// Returns `true` when the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
