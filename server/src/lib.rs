//! Cache peer server.
//!
//! Wraps the RPC endpoint, the consistent-hash ring, and the table of
//! per-peer clients into one node of the cache fleet. The server is
//! decoupled from the group controller: it resolves inbound requests
//! against a [`GroupRegistry`](meshcache::GroupRegistry) it is handed,
//! and routes outbound fetches by implementing
//! [`PeerPicker`](meshcache::PeerPicker).

pub mod config;
pub mod logging;
pub mod metrics;
pub mod registry;
mod service;

pub use config::{Config, ConfigError, GroupConfig, LogFormat, LoggingConfig};
pub use registry::{LEASE_TTL, LocalRegistry, RegisterFuture, ServiceRegistry};
pub use service::{CacheServer, ServerError};
