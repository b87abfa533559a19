//! Group controller and registry.

use crate::loader::Loader;
use crate::metrics::{
    HOT_HITS, HOT_PROMOTIONS, LOADS, MAIN_HITS, PEER_FALLBACKS, PEER_FETCHES,
};
use crate::peers::{Peer, PeerError, PeerPicker};
use ahash::AHashMap;
use mesh_cache::{ByteView, EvictionPolicy, SyncCache};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Remote gets per minute at which a key is promoted to the hot cache.
pub const MAX_MINUTE_REMOTE_QPS: i64 = 10;

/// Default time-to-live applied to cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// The hot cache gets this fraction of the main cache's byte budget.
const HOT_CACHE_DIVISOR: u64 = 8;

/// Error returned by [`Group::get`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum GetError {
    /// The key was empty.
    #[error("key is required")]
    EmptyKey,
    /// No group registered under this name (used by the RPC server).
    #[error("group not found: {0}")]
    GroupNotFound(String),
    /// The user-supplied loader failed. Surfaced verbatim, never cached.
    #[error("load failed: {0}")]
    Loader(Arc<dyn std::error::Error + Send + Sync>),
}

/// Per-key statistics for remote fetches, kept until the key is promoted
/// to the hot cache.
struct KeyStats {
    first_remote_get: Instant,
    remote_count: AtomicI64,
}

/// A named cache namespace.
///
/// Gets follow: hot cache → main cache → single-flight load (remote
/// owner if one is picked, local loader otherwise). Created through
/// [`GroupRegistry::new_group`].
pub struct Group {
    name: String,
    loader: Arc<dyn Loader>,
    main_cache: SyncCache,
    hot_cache: SyncCache,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flight: singleflight::Group<String, Result<ByteView, GetError>>,
    keys: Mutex<AHashMap<String, Arc<KeyStats>>>,
}

impl Group {
    /// The group's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install the peer picker. One-shot.
    ///
    /// # Panics
    ///
    /// Panics when called a second time.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        if self.peers.set(picker).is_err() {
            panic!("register_peers called more than once");
        }
    }

    /// Get the value for `key`.
    pub async fn get(&self, key: &str) -> Result<ByteView, GetError> {
        if key.is_empty() {
            return Err(GetError::EmptyKey);
        }
        if let Some(value) = self.hot_cache.get(key) {
            HOT_HITS.increment();
            trace!(group = %self.name, key, "hot cache hit");
            return Ok(value);
        }
        if let Some(value) = self.main_cache.get(key) {
            MAIN_HITS.increment();
            trace!(group = %self.name, key, "main cache hit");
            return Ok(value);
        }
        self.load(key).await
    }

    /// Load a missed key, coalescing concurrent loads of the same key.
    async fn load(&self, key: &str) -> Result<ByteView, GetError> {
        self.flight
            .work(key.to_string(), || async {
                LOADS.increment();
                if let Some(picker) = self.peers.get()
                    && let Some(peer) = picker.pick_peer(key)
                {
                    match self.get_from_peer(peer.as_ref(), key).await {
                        Ok(value) => return Ok(value),
                        Err(PeerError::Transport(reason)) => {
                            PEER_FALLBACKS.increment();
                            warn!(
                                group = %self.name,
                                key, %reason, "peer fetch failed, loading locally"
                            );
                        }
                        Err(PeerError::Remote(reason)) => {
                            PEER_FALLBACKS.increment();
                            warn!(
                                group = %self.name,
                                key, %reason, "peer reported an error, loading locally"
                            );
                        }
                    }
                }
                self.get_locally(key).await
            })
            .await
    }

    /// Run the user loader and populate the main cache.
    async fn get_locally(&self, key: &str) -> Result<ByteView, GetError> {
        let bytes = self
            .loader
            .load(key)
            .await
            .map_err(|e| GetError::Loader(Arc::from(e)))?;
        // Clone into a fresh buffer: the loader may reuse its own.
        let value = ByteView::copy_from_slice(&bytes);
        self.main_cache.add(key, value.clone());
        Ok(value)
    }

    /// Fetch from a remote owner and track the key's remote-get rate.
    async fn get_from_peer(&self, peer: &dyn Peer, key: &str) -> Result<ByteView, PeerError> {
        let bytes = peer.get(&self.name, key).await?;
        PEER_FETCHES.increment();
        let value = ByteView::new(bytes);

        let stats = self.keys.lock().get(key).cloned();
        match stats {
            Some(stats) => {
                let count = stats.remote_count.fetch_add(1, Ordering::Relaxed) + 1;
                let minutes = (stats.first_remote_get.elapsed().as_secs_f64() / 60.0)
                    .round()
                    .max(1.0) as i64;
                if count / minutes >= MAX_MINUTE_REMOTE_QPS {
                    debug!(group = %self.name, key, "promoting hot key");
                    HOT_PROMOTIONS.increment();
                    self.hot_cache.add(key, value.clone());
                    // Reclaim the stats entry; the hot cache serves from
                    // here on.
                    self.keys.lock().remove(key);
                }
            }
            None => {
                self.keys.lock().insert(
                    key.to_string(),
                    Arc::new(KeyStats {
                        first_remote_get: Instant::now(),
                        remote_count: AtomicI64::new(1),
                    }),
                );
            }
        }
        Ok(value)
    }

    /// Live entries in the main cache.
    pub fn main_cache_len(&self) -> usize {
        self.main_cache.len()
    }

    /// Live entries in the hot cache.
    pub fn hot_cache_len(&self) -> usize {
        self.hot_cache.len()
    }
}

/// Registry of groups by name.
///
/// An explicit handle rather than process-global state: the RPC server
/// owns one and resolves inbound requests against it, and tests build as
/// many as they like.
pub struct GroupRegistry {
    groups: RwLock<AHashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(AHashMap::new()),
        }
    }

    /// Create and register a group.
    ///
    /// The main cache is bounded to `cache_bytes` and the hot cache to an
    /// eighth of that. Registering a name again replaces the previous
    /// group.
    pub fn new_group(
        &self,
        name: &str,
        cache_bytes: u64,
        policy: EvictionPolicy,
        loader: impl Loader,
    ) -> Arc<Group> {
        let group = Arc::new(Group {
            name: name.to_string(),
            loader: Arc::new(loader),
            main_cache: SyncCache::new(cache_bytes, policy, DEFAULT_TTL),
            hot_cache: SyncCache::new(cache_bytes / HOT_CACHE_DIVISOR, policy, DEFAULT_TTL),
            peers: OnceLock::new(),
            flight: singleflight::Group::new(),
            keys: Mutex::new(AHashMap::new()),
        });
        self.groups.write().insert(name.to_string(), group.clone());
        group
    }

    /// Look up a group by name.
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}
