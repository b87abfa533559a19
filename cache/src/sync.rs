//! Thread-safe cache wrapper.
//!
//! `SyncCache` is a narrow façade over the eviction stores: it serializes
//! access behind a readers-writer lock and constructs the underlying
//! store lazily on first `add`, so an unused cache costs nothing beyond
//! the wrapper itself.

use crate::{ByteView, EvictionPolicy, LfuCache, LruCache, Store};
use parking_lot::RwLock;
use std::time::Duration;

/// A thread-safe, lazily initialized cache with a fixed eviction policy
/// and a default time-to-live applied to every insert.
pub struct SyncCache {
    inner: RwLock<Option<Box<dyn Store>>>,
    max_bytes: u64,
    policy: EvictionPolicy,
    default_ttl: Duration,
}

impl SyncCache {
    /// Create a cache bounded to `max_bytes` (`0` = unbounded). No store
    /// is allocated until the first `add`.
    pub fn new(max_bytes: u64, policy: EvictionPolicy, default_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(None),
            max_bytes,
            policy,
            default_ttl,
        }
    }

    /// Insert or update an entry with the cache's default time-to-live.
    pub fn add(&self, key: &str, value: ByteView) {
        let mut guard = self.inner.write();
        let store = guard.get_or_insert_with(|| match self.policy {
            EvictionPolicy::Lru => Box::new(LruCache::new(self.max_bytes)),
            EvictionPolicy::Lfu => Box::new(LfuCache::new(self.max_bytes)),
        });
        store.add(key, value, self.default_ttl);
    }

    /// Look up an entry.
    ///
    /// Takes the write lock: a hit updates the store's order metadata
    /// (recency position or access frequency), so even reads mutate.
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.inner.write();
        guard.as_mut()?.get(key)
    }

    /// Number of live entries. Zero before first use.
    pub fn len(&self) -> usize {
        self.inner.read().as_ref().map_or(0, |store| store.len())
    }

    /// Returns `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently accounted for. Zero before first use.
    pub fn used_bytes(&self) -> u64 {
        self.inner
            .read()
            .as_ref()
            .map_or(0, |store| store.used_bytes())
    }

    /// The configured byte budget.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn sync_cache(max_bytes: u64, policy: EvictionPolicy) -> SyncCache {
        SyncCache::new(max_bytes, policy, Duration::from_secs(60))
    }

    #[test]
    fn lazy_until_first_add() {
        let cache = sync_cache(1024, EvictionPolicy::Lru);
        assert!(cache.inner.read().is_none());
        assert_eq!(cache.get("missing"), None);
        assert!(cache.inner.read().is_none());

        cache.add("key", ByteView::from("value"));
        assert!(cache.inner.read().is_some());
        assert_eq!(cache.get("key"), Some(ByteView::from("value")));
    }

    #[test]
    fn selects_the_configured_policy() {
        for policy in [EvictionPolicy::Lru, EvictionPolicy::Lfu] {
            let cache = sync_cache(0, policy);
            cache.add("key", ByteView::from("value"));
            assert_eq!(cache.get("key"), Some(ByteView::from("value")));
            assert_eq!(cache.len(), 1);
        }
    }

    #[test]
    fn concurrent_adds_and_gets() {
        let cache = Arc::new(sync_cache(0, EvictionPolicy::Lru));
        let mut handles = Vec::new();

        for t in 0..4 {
            let cache = cache.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("key-{t}-{i}");
                    cache.add(&key, ByteView::from("value"));
                    assert_eq!(cache.get(&key), Some(ByteView::from("value")));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
    }
}
