//! Recency-ordered store.
//!
//! `LruCache` keeps entries on an intrusive doubly-linked list with the
//! most recently used entry at the front. Lookup is a map from key to
//! list node; a hit moves the node to the front, eviction pops the tail.
//! Entries carry a per-entry expiry; expirations observed during `get`
//! are converted to misses.
//!
//! Expiry instants are jittered forward by a uniform random amount so
//! that entries populated together do not all expire in the same tick.
//! An update never shortens an entry's remaining life.

use crate::store::{EvictionCallback, Store};
use crate::ByteView;
use ahash::AHashMap;
use rand::Rng;
use std::ptr::NonNull;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default width of the expiry jitter window.
pub const DEFAULT_TTL_JITTER: Duration = Duration::from_secs(60);

struct Node {
    prev: Option<NonNull<Node>>,
    next: Option<NonNull<Node>>,
    key: String,
    value: ByteView,
    expires_at: Instant,
}

/// A byte-bounded store that evicts the least recently used entry.
pub struct LruCache {
    max_bytes: u64,
    used_bytes: u64,
    map: AHashMap<String, NonNull<Node>>,
    /// Most recently used.
    head: Option<NonNull<Node>>,
    /// Least recently used.
    tail: Option<NonNull<Node>>,
    jitter: Duration,
    on_evicted: Option<EvictionCallback>,
}

// SAFETY: the raw node pointers only reference heap memory owned by this
// struct; nothing is shared. All mutation goes through `&mut self`, so
// the outer lock is what actually serializes access.
unsafe impl Send for LruCache {}
unsafe impl Sync for LruCache {}

impl LruCache {
    /// Create a store bounded to `max_bytes` (`0` = unbounded), with the
    /// default expiry jitter.
    pub fn new(max_bytes: u64) -> Self {
        Self::with_jitter(max_bytes, DEFAULT_TTL_JITTER)
    }

    /// Create a store with an explicit jitter window. A zero window makes
    /// expirations exact, which deterministic tests rely on.
    pub fn with_jitter(max_bytes: u64, jitter: Duration) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            map: AHashMap::new(),
            head: None,
            tail: None,
            jitter,
            on_evicted: None,
        }
    }

    /// Install a callback fired once per evicted or expired entry.
    pub fn set_on_evicted(&mut self, callback: EvictionCallback) {
        self.on_evicted = Some(callback);
    }

    fn jittered_expiry(&self, ttl: Duration) -> Instant {
        let mut expires_at = Instant::now() + ttl;
        let window = self.jitter.as_secs();
        if window > 0 {
            expires_at += Duration::from_secs(rand::rng().random_range(0..window));
        }
        expires_at
    }

    fn detach(&mut self, ptr: NonNull<Node>) {
        unsafe {
            let node = ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }
            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    fn attach_front(&mut self, mut ptr: NonNull<Node>) {
        unsafe {
            let node = ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(ptr),
                None => self.tail = Some(ptr),
            }
            self.head = Some(ptr);
        }
    }

    /// Unlink a node from the list, the map, and the byte accounting.
    /// The caller decides whether the eviction callback fires.
    fn remove_node(&mut self, ptr: NonNull<Node>) -> Box<Node> {
        self.detach(ptr);
        let node = unsafe { Box::from_raw(ptr.as_ptr()) };
        self.map.remove(node.key.as_str());
        self.used_bytes -= (node.key.len() + node.value.len()) as u64;
        node
    }

    fn notify_evicted(&self, node: &Node) {
        if let Some(callback) = &self.on_evicted {
            callback(&node.key, &node.value);
        }
    }
}

impl Store for LruCache {
    fn get(&mut self, key: &str) -> Option<ByteView> {
        let ptr = *self.map.get(key)?;
        if unsafe { ptr.as_ref().expires_at } <= Instant::now() {
            let node = self.remove_node(ptr);
            debug!(key, "recency store entry expired");
            self.notify_evicted(&node);
            return None;
        }
        self.detach(ptr);
        self.attach_front(ptr);
        Some(unsafe { ptr.as_ref().value.clone() })
    }

    fn add(&mut self, key: &str, value: ByteView, ttl: Duration) {
        let expires_at = self.jittered_expiry(ttl);

        if let Some(&ptr) = self.map.get(key) {
            self.detach(ptr);
            self.attach_front(ptr);

            let node = unsafe { &mut *ptr.as_ptr() };
            self.used_bytes -= node.value.len() as u64;
            self.used_bytes += value.len() as u64;
            node.value = value;
            // An update extends an entry's life, never shortens it.
            if node.expires_at < expires_at {
                node.expires_at = expires_at;
            }
        } else {
            self.used_bytes += (key.len() + value.len()) as u64;
            let node = Box::new(Node {
                prev: None,
                next: None,
                key: key.to_string(),
                value,
                expires_at,
            });
            let ptr = NonNull::from(Box::leak(node));
            self.map.insert(key.to_string(), ptr);
            self.attach_front(ptr);
        }

        while self.max_bytes > 0 && self.used_bytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    fn remove_oldest(&mut self) {
        if let Some(tail) = self.tail {
            let node = self.remove_node(tail);
            self.notify_evicted(&node);
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn used_bytes(&self) -> u64 {
        self.used_bytes
    }
}

impl Drop for LruCache {
    fn drop(&mut self) {
        while let Some(tail) = self.tail {
            self.detach(tail);
            drop(unsafe { Box::from_raw(tail.as_ptr()) });
        }
        self.map.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread::sleep;

    const TTL: Duration = Duration::from_secs(60);

    fn cache(max_bytes: u64) -> LruCache {
        LruCache::with_jitter(max_bytes, Duration::ZERO)
    }

    #[test]
    fn get_hit_and_miss() {
        let mut lru = cache(0);
        lru.add("key1", ByteView::from("1234"), TTL);

        assert_eq!(lru.get("key1"), Some(ByteView::from("1234")));
        assert_eq!(lru.get("key2"), None);
    }

    #[test]
    fn byte_budget_evicts_least_recent() {
        let cap = "key1key2value1value2".len() as u64;
        let mut lru = cache(cap);
        lru.add("key1", ByteView::from("value1"), TTL);
        lru.add("key2", ByteView::from("value2"), TTL);
        lru.add("k3", ByteView::from("v3"), TTL);

        assert_eq!(lru.get("key1"), None);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        // Room for exactly two of the equal-sized entries.
        let mut lru = cache(12);
        lru.add("k1", ByteView::from("aaaa"), TTL);
        lru.add("k2", ByteView::from("bbbb"), TTL);

        assert!(lru.get("k1").is_some());
        lru.add("k3", ByteView::from("cccc"), TTL);

        assert!(lru.get("k1").is_some());
        assert_eq!(lru.get("k2"), None);
        assert!(lru.get("k3").is_some());
    }

    #[test]
    fn eviction_callback_order() {
        let (tx, rx) = mpsc::channel();
        let mut lru = cache(10);
        lru.set_on_evicted(Box::new(move |key, _value| {
            tx.send(key.to_string()).unwrap();
        }));

        lru.add("key1", ByteView::from("123456"), TTL);
        lru.add("k2", ByteView::from("k2"), TTL);
        lru.add("k3", ByteView::from("k3"), TTL);
        lru.add("k4", ByteView::from("k4"), TTL);

        let evicted: Vec<String> = rx.try_iter().collect();
        assert_eq!(evicted, vec!["key1".to_string(), "k2".to_string()]);
    }

    #[test]
    fn update_adjusts_byte_accounting() {
        let mut lru = cache(0);
        lru.add("key", ByteView::from("1"), TTL);
        lru.add("key", ByteView::from("111"), TTL);

        assert_eq!(lru.used_bytes(), ("key".len() + "111".len()) as u64);
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn expired_entry_is_a_miss_and_fires_callback() {
        let (tx, rx) = mpsc::channel();
        let mut lru = cache(0);
        lru.set_on_evicted(Box::new(move |key, _value| {
            tx.send(key.to_string()).unwrap();
        }));

        lru.add("gone", ByteView::from("v"), Duration::from_millis(1));
        sleep(Duration::from_millis(10));

        assert_eq!(lru.get("gone"), None);
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.used_bytes(), 0);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["gone".to_string()]);
    }

    #[test]
    fn update_never_shortens_expiry() {
        let mut lru = cache(0);
        lru.add("key", ByteView::from("v1"), Duration::from_secs(60));
        lru.add("key", ByteView::from("v2"), Duration::from_millis(1));
        sleep(Duration::from_millis(10));

        // The shorter TTL was ignored; the entry is still live.
        assert_eq!(lru.get("key"), Some(ByteView::from("v2")));
    }

    #[test]
    fn unbounded_when_budget_is_zero() {
        let mut lru = cache(0);
        for i in 0..128 {
            lru.add(&format!("key-{i}"), ByteView::from("value"), TTL);
        }
        assert_eq!(lru.len(), 128);
    }

    #[test]
    fn used_bytes_matches_live_entries() {
        // Each entry accounts for 1 + 4 = 5 bytes; the budget fits two.
        let mut lru = cache(12);
        lru.add("a", ByteView::from("aaaa"), TTL);
        lru.add("b", ByteView::from("bbbb"), TTL);
        lru.add("c", ByteView::from("cccc"), TTL);
        assert_eq!(lru.used_bytes(), 10);

        lru.get("b");
        lru.add("d", ByteView::from("dddd"), TTL);
        lru.remove_oldest();

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.used_bytes(), 5);
        assert!(lru.get("d").is_some());
    }
}
