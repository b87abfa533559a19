//! Bounded in-memory key→bytes stores with pluggable eviction.
//!
//! This crate provides the single-node storage layer of meshcache:
//!
//! - [`ByteView`]: an immutable, cheaply clonable byte value
//! - [`LruCache`]: recency-ordered store (intrusive doubly-linked list)
//! - [`LfuCache`]: frequency-ordered store (array min-heap)
//! - [`SyncCache`]: thread-safe wrapper that lazily constructs one of the
//!   above behind a readers-writer lock
//!
//! Both stores are bounded by a byte budget (`len(key) + len(value)` per
//! entry, `0` = unbounded), expire entries per-entry, and can report each
//! eviction through a callback. The cores are single-threaded; thread
//! safety is the wrapper's job.

mod byteview;
mod lfu;
mod lru;
mod policy;
mod store;
mod sync;

pub use byteview::ByteView;
pub use lfu::LfuCache;
pub use lru::LruCache;
pub use policy::{EvictionPolicy, PolicyError};
pub use store::{EvictionCallback, Store};
pub use sync::SyncCache;
