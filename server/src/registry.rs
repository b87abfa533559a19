//! Service registry contract and the in-process implementation.
//!
//! A node announces itself to a registry under a service name and keeps
//! a short lease alive until it stops; clients resolve the service name
//! to the set of live addresses. Production deployments plug an external
//! registry (etcd and friends) in behind [`ServiceRegistry`];
//! [`LocalRegistry`] implements the same contract in-process for tests
//! and single-host runs.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

/// Lease lifetime for a registration. Keep-alive ticks run at half this.
pub const LEASE_TTL: Duration = Duration::from_secs(5);

/// Future returned by [`ServiceRegistry::register`].
pub type RegisterFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The service-discovery contract the server consumes.
pub trait ServiceRegistry: Send + Sync + 'static {
    /// Register `addr` under `service` and keep the lease alive.
    ///
    /// The returned future completes only when `stop` signals shutdown
    /// (or its sender is dropped), after deregistering the address.
    fn register(&self, service: &str, addr: SocketAddr, stop: watch::Receiver<bool>)
    -> RegisterFuture;

    /// Resolve a service name to its live, unexpired addresses.
    fn lookup(&self, service: &str) -> Vec<SocketAddr>;
}

/// Lease table entry: address → lease expiry.
type Leases = HashMap<String, HashMap<SocketAddr, Instant>>;

/// In-process registry with lease semantics.
#[derive(Default)]
pub struct LocalRegistry {
    leases: Arc<Mutex<Leases>>,
}

impl LocalRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ServiceRegistry for LocalRegistry {
    fn register(
        &self,
        service: &str,
        addr: SocketAddr,
        mut stop: watch::Receiver<bool>,
    ) -> RegisterFuture {
        let leases = self.leases.clone();
        let service = service.to_string();

        Box::pin(async move {
            info!(service, %addr, "registered");
            loop {
                leases
                    .lock()
                    .entry(service.clone())
                    .or_default()
                    .insert(addr, Instant::now() + LEASE_TTL);

                tokio::select! {
                    _ = tokio::time::sleep(LEASE_TTL / 2) => {
                        debug!(service, %addr, "lease keep-alive");
                    }
                    _ = stop.changed() => break,
                }
            }
            if let Some(entries) = leases.lock().get_mut(&service) {
                entries.remove(&addr);
            }
            info!(service, %addr, "deregistered");
        })
    }

    fn lookup(&self, service: &str) -> Vec<SocketAddr> {
        let now = Instant::now();
        self.leases
            .lock()
            .get(service)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, expiry)| **expiry > now)
                    .map(|(addr, _)| *addr)
                    .collect()
            })
            .unwrap_or_default()
    }
}
