//! Distributed cache controller.
//!
//! A [`Group`] is a named cache namespace: gets probe the hot cache, then
//! the main cache, and on a miss load the value exactly once per key
//! (single-flight) — from the owning peer when a peer picker is
//! registered and routes the key elsewhere, or from the group's
//! [`Loader`] otherwise. Keys fetched repeatedly from remote owners are
//! promoted into the hot cache once their observed per-minute rate
//! crosses a threshold.
//!
//! The controller is transport-agnostic: remote access goes through the
//! [`Peer`] / [`PeerPicker`] capabilities, implemented elsewhere by the
//! RPC server and client.

mod group;
mod loader;
pub mod metrics;
mod peers;

pub use group::{DEFAULT_TTL, GetError, Group, GroupRegistry, MAX_MINUTE_REMOTE_QPS};
pub use loader::{BoxError, LoadFuture, Loader, LoaderFn, loader_fn};
pub use peers::{Peer, PeerError, PeerFuture, PeerPicker};

// The value and policy types are part of this crate's API surface.
pub use mesh_cache::{ByteView, EvictionPolicy};
