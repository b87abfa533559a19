//! The peer capabilities: how a group reaches remote owners.

use bytes::Bytes;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a remote [`Peer`] fetch.
pub type PeerFuture = Pin<Box<dyn Future<Output = Result<Bytes, PeerError>> + Send>>;

/// Error from a remote peer fetch.
///
/// Both variants make the controller fall back to the local loader; they
/// are kept apart because a transport failure says nothing about the
/// key, while a remote error is the serving peer's verdict.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PeerError {
    /// Connection, encoding, or deadline failure.
    #[error("transport: {0}")]
    Transport(String),
    /// The remote peer answered with an error (unknown group, loader
    /// failure on the owner, ...).
    #[error("remote: {0}")]
    Remote(String),
}

/// A remote peer that can serve group gets.
pub trait Peer: Send + Sync {
    /// Fetch the value for `(group, key)` from this peer.
    fn get(&self, group: &str, key: &str) -> PeerFuture;
}

/// Routes a key to the peer that owns it.
pub trait PeerPicker: Send + Sync {
    /// Pick the owner for `key`. `None` means the local peer owns the
    /// key (or no peers are configured) and the caller should load
    /// locally.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn Peer>>;
}
