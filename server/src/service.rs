//! The cache peer server.

use crate::metrics::{CONNECTIONS_ACCEPTED, CONNECTIONS_ACTIVE, REQUESTS, REQUEST_ERRORS};
use crate::registry::ServiceRegistry;
use ahash::AHashMap;
use hashring::{DEFAULT_REPLICAS, Ring};
use meshcache::{GetError, GroupRegistry, Peer, PeerPicker};
use meshcache_client::PeerClient;
use parking_lot::Mutex;
use protocol::{FrameDecoder, GetReply, GetRequest, encode_frame};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Server lifecycle and configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server already started")]
    AlreadyRunning,
    #[error("invalid listen address {0:?}")]
    InvalidAddr(String),
    #[error("bind {0}: {1}")]
    Bind(String, #[source] std::io::Error),
}

struct State {
    running: bool,
    stop: Option<watch::Sender<bool>>,
    ring: Ring,
    clients: AHashMap<String, Arc<PeerClient>>,
}

/// One node of the cache fleet.
///
/// Owns the RPC endpoint, the consistent-hash ring, and one lazy client
/// per known peer. Implements [`PeerPicker`]: keys the ring maps to this
/// node's own address resolve to `None`, sending the controller to its
/// local loader. The server does its own locking and is decoupled from
/// the group controller.
pub struct CacheServer {
    self_addr: String,
    groups: Arc<GroupRegistry>,
    service: String,
    registry: Option<Arc<dyn ServiceRegistry>>,
    state: Mutex<State>,
}

impl CacheServer {
    /// Create a server for the node at `self_addr` (`ip:port`), serving
    /// the given groups. The server starts with an empty ring; call
    /// [`set_peers`](Self::set_peers) to populate membership.
    pub fn new(self_addr: impl Into<String>, groups: Arc<GroupRegistry>) -> Self {
        Self {
            self_addr: self_addr.into(),
            groups,
            service: "meshcache".to_string(),
            registry: None,
            state: Mutex::new(State {
                running: false,
                stop: None,
                ring: Ring::new(DEFAULT_REPLICAS),
                clients: AHashMap::new(),
            }),
        }
    }

    /// Announce this node to a service registry while running.
    pub fn with_registry(
        mut self,
        service: impl Into<String>,
        registry: Arc<dyn ServiceRegistry>,
    ) -> Self {
        self.service = service.into();
        self.registry = Some(registry);
        self
    }

    /// This node's own address.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// Add peers to the ring and cache a lazy client handle per address.
    pub fn set_peers<I, S>(&self, addrs: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock();
        for addr in addrs {
            let addr = addr.as_ref();
            state.ring.add([addr]);
            state
                .clients
                .entry(addr.to_string())
                .or_insert_with(|| Arc::new(PeerClient::new(addr)));
        }
    }

    /// Run the server: bind, register with the registry, and serve
    /// inbound peer requests until [`stop`](Self::stop).
    ///
    /// Returns an error when already running or when the listener cannot
    /// be bound.
    pub async fn start(self: &Arc<Self>) -> Result<(), ServerError> {
        // Validate before touching any state.
        let registry_addr = match &self.registry {
            Some(_) => Some(
                self.self_addr
                    .parse()
                    .map_err(|_| ServerError::InvalidAddr(self.self_addr.clone()))?,
            ),
            None => None,
        };

        let stop_rx = {
            let mut state = self.state.lock();
            if state.running {
                return Err(ServerError::AlreadyRunning);
            }
            let (stop_tx, stop_rx) = watch::channel(false);
            state.running = true;
            state.stop = Some(stop_tx);
            stop_rx
        };

        let listener = match TcpListener::bind(&self.self_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let mut state = self.state.lock();
                state.running = false;
                state.stop = None;
                return Err(ServerError::Bind(self.self_addr.clone(), e));
            }
        };
        info!(addr = %self.self_addr, "cache server listening");

        if let (Some(registry), Some(addr)) = (&self.registry, registry_addr) {
            tokio::spawn(registry.register(&self.service, addr, stop_rx.clone()));
        }

        let mut stop = stop_rx;
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        CONNECTIONS_ACCEPTED.increment();
                        CONNECTIONS_ACTIVE.increment();
                        let server = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await
                                && !is_connection_reset(&e)
                            {
                                debug!(%peer_addr, error = %e, "connection error");
                            }
                            CONNECTIONS_ACTIVE.decrement();
                        });
                    }
                    Err(e) => warn!(error = %e, "accept error"),
                },
            }
        }
        info!(addr = %self.self_addr, "cache server stopped");
        Ok(())
    }

    /// Signal the accept loop and the registry task to stop, and drop
    /// membership state. No-op when not running.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        if let Some(stop) = state.stop.take() {
            let _ = stop.send(true);
        }
        state.clients.clear();
        state.ring = Ring::new(DEFAULT_REPLICAS);
    }

    /// Returns `true` while the server is accepting requests.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; 16 * 1024];

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            decoder.feed(&buf[..n]);

            loop {
                match decoder.decode() {
                    Ok(Some(frame)) => {
                        let reply = self.handle_request(&frame).await;
                        stream.write_all(&encode_frame(&reply.encode())).await?;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
                    }
                }
            }
        }
    }

    /// Answer one unary get. Failures become protocol errors with a
    /// human-readable description.
    async fn handle_request(&self, frame: &[u8]) -> GetReply {
        REQUESTS.increment();

        let Some(request) = GetRequest::decode(frame) else {
            REQUEST_ERRORS.increment();
            return GetReply::Error("malformed request".to_string());
        };
        debug!(addr = %self.self_addr, group = %request.group, key = %request.key, "rpc get");

        if request.key.is_empty() {
            REQUEST_ERRORS.increment();
            return GetReply::Error(GetError::EmptyKey.to_string());
        }
        let Some(group) = self.groups.get_group(&request.group) else {
            REQUEST_ERRORS.increment();
            return GetReply::Error(GetError::GroupNotFound(request.group).to_string());
        };
        match group.get(&request.key).await {
            Ok(value) => GetReply::Value(value.into_bytes()),
            Err(e) => {
                REQUEST_ERRORS.increment();
                GetReply::Error(e.to_string())
            }
        }
    }
}

impl PeerPicker for CacheServer {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn Peer>> {
        let state = self.state.lock();
        let owner = state.ring.get(key)?;
        if owner == self.self_addr {
            trace!(key, "key is owned locally");
            return None;
        }
        debug!(key, owner, "picked remote peer");
        let client = state.clients.get(owner)?.clone();
        Some(client as Arc<dyn Peer>)
    }
}

fn is_connection_reset(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
    )
}
