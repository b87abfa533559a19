//! Frequency-ordered store.
//!
//! `LfuCache` keeps entries in an array-backed min-heap ordered by access
//! frequency, plus a key→slot index that is kept consistent across heap
//! sifts. Eviction pops the heap root (the least frequently used entry).
//!
//! Unlike the recency store, a re-`add` resets the entry's expiry to
//! `now + ttl` and no jitter is applied.

use crate::store::{EvictionCallback, Store};
use crate::ByteView;
use ahash::AHashMap;
use std::time::{Duration, Instant};
use tracing::debug;

struct Entry {
    key: String,
    value: ByteView,
    freq: u64,
    expires_at: Instant,
}

/// A byte-bounded store that evicts the least frequently used entry.
pub struct LfuCache {
    max_bytes: u64,
    used_bytes: u64,
    heap: Vec<Entry>,
    index: AHashMap<String, usize>,
    on_evicted: Option<EvictionCallback>,
}

impl LfuCache {
    /// Create a store bounded to `max_bytes` (`0` = unbounded).
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            heap: Vec::new(),
            index: AHashMap::new(),
            on_evicted: None,
        }
    }

    /// Install a callback fired once per evicted or expired entry.
    pub fn set_on_evicted(&mut self, callback: EvictionCallback) {
        self.on_evicted = Some(callback);
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        *self.index.get_mut(self.heap[a].key.as_str()).unwrap() = a;
        *self.index.get_mut(self.heap[b].key.as_str()).unwrap() = b;
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.heap[slot].freq < self.heap[parent].freq {
                self.swap(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = 2 * slot + 1;
            if left >= self.heap.len() {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < self.heap.len() && self.heap[right].freq < self.heap[left].freq {
                child = right;
            }
            if self.heap[child].freq < self.heap[slot].freq {
                self.swap(slot, child);
                slot = child;
            } else {
                break;
            }
        }
    }

    /// Remove the entry at `slot`, restoring heap order, and return it.
    fn remove_at(&mut self, slot: usize) -> Entry {
        let last = self.heap.len() - 1;
        if slot != last {
            self.swap(slot, last);
        }
        let entry = self.heap.pop().unwrap();
        self.index.remove(entry.key.as_str());
        self.used_bytes -= (entry.key.len() + entry.value.len()) as u64;
        if slot < self.heap.len() {
            self.sift_down(slot);
            self.sift_up(slot);
        }
        entry
    }

    fn notify_evicted(&self, entry: &Entry) {
        if let Some(callback) = &self.on_evicted {
            callback(&entry.key, &entry.value);
        }
    }
}

impl Store for LfuCache {
    fn get(&mut self, key: &str) -> Option<ByteView> {
        let slot = *self.index.get(key)?;
        if self.heap[slot].expires_at <= Instant::now() {
            let entry = self.remove_at(slot);
            debug!(key, "frequency store entry expired");
            self.notify_evicted(&entry);
            return None;
        }
        self.heap[slot].freq += 1;
        let value = self.heap[slot].value.clone();
        self.sift_down(slot);
        Some(value)
    }

    fn add(&mut self, key: &str, value: ByteView, ttl: Duration) {
        if let Some(&slot) = self.index.get(key) {
            let entry = &mut self.heap[slot];
            entry.freq += 1;
            entry.expires_at = Instant::now() + ttl;
            self.used_bytes -= entry.value.len() as u64;
            self.used_bytes += value.len() as u64;
            entry.value = value;
            self.sift_down(slot);
        } else {
            self.used_bytes += (key.len() + value.len()) as u64;
            let slot = self.heap.len();
            self.heap.push(Entry {
                key: key.to_string(),
                value,
                freq: 1,
                expires_at: Instant::now() + ttl,
            });
            self.index.insert(key.to_string(), slot);
            self.sift_up(slot);
        }

        while self.max_bytes > 0 && self.used_bytes > self.max_bytes {
            self.remove_oldest();
        }
    }

    fn remove_oldest(&mut self) {
        if !self.heap.is_empty() {
            let entry = self.remove_at(0);
            self.notify_evicted(&entry);
        }
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn used_bytes(&self) -> u64 {
        self.used_bytes
    }
}
