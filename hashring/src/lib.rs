//! Consistent-hash ring with virtual nodes.
//!
//! Maps a key to the peer that owns it. Each peer is inserted as
//! `replicas` virtual nodes at positions `hash(i ++ peer)` on a circular
//! 32-bit hash space, which smooths the distribution when the peer count
//! is small. Lookup binary-searches for the first virtual node at or
//! after the key's hash, wrapping to the start of the ring.
//!
//! The ring owns no locking; callers serialize access.

mod crc32;

use ahash::AHashMap;

/// Hash function over raw key bytes.
pub type HashFn = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// Default number of virtual nodes per peer.
pub const DEFAULT_REPLICAS: usize = 50;

/// A consistent-hash ring mapping keys to peer identities.
pub struct Ring {
    replicas: usize,
    hash: HashFn,
    /// Sorted virtual-node hash values.
    keys: Vec<u32>,
    /// Virtual-node hash → peer identity.
    peers: AHashMap<u32, String>,
}

impl Ring {
    /// Create an empty ring using the CRC32 hash.
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, Box::new(crc32::checksum))
    }

    /// Create an empty ring with a caller-supplied hash function.
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            replicas,
            hash,
            keys: Vec::new(),
            peers: AHashMap::new(),
        }
    }

    /// Insert peers, each as `replicas` virtual nodes.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let virtual_node = format!("{i}{peer}");
                let hash = (self.hash)(virtual_node.as_bytes());
                self.keys.push(hash);
                self.peers.insert(hash, peer.to_string());
            }
        }
        self.keys.sort_unstable();
    }

    /// Map a key to its owner peer. Returns `None` on an empty ring.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.keys.partition_point(|&node| node < hash);
        // Wrap: a key hashing past the last virtual node lands on the first.
        let node = self.keys[if idx == self.keys.len() { 0 } else { idx }];
        self.peers.get(&node).map(String::as_str)
    }

    /// Returns `true` when no peers have been added.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

impl Default for Ring {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}
