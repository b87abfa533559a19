//! Peer RPC client.
//!
//! `PeerClient` implements the [`Peer`] capability over the framed wire
//! protocol: one TCP connection per remote peer, dialed lazily on first
//! use and redialed after any transport failure. The protocol is unary,
//! so requests on a connection are serialized; every exchange runs under
//! a bounded deadline (10 s by default).

use bytes::Bytes;
use meshcache::{Peer, PeerError, PeerFuture};
use protocol::{FrameDecoder, GetReply, GetRequest, encode_frame};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

/// Default per-request deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

struct Inner {
    addr: String,
    deadline: Duration,
    conn: Mutex<Option<TcpStream>>,
}

/// Client handle for one remote peer. Cheap to clone.
#[derive(Clone)]
pub struct PeerClient {
    inner: Arc<Inner>,
}

impl PeerClient {
    /// Create a client for the peer at `addr` with the default deadline.
    /// No connection is made until the first request.
    pub fn new(addr: impl Into<String>) -> Self {
        Self::with_deadline(addr, DEFAULT_DEADLINE)
    }

    /// Create a client with an explicit per-request deadline.
    pub fn with_deadline(addr: impl Into<String>, deadline: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                addr: addr.into(),
                deadline,
                conn: Mutex::new(None),
            }),
        }
    }

    /// The remote peer's address.
    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    async fn exchange(&self, request: &GetRequest) -> Result<Bytes, PeerError> {
        let mut conn = self.inner.conn.lock().await;
        let result = Self::try_exchange(&self.inner.addr, &mut conn, request).await;
        // A transport failure leaves the stream in an unknown state;
        // drop it and redial on the next request. Remote errors arrive
        // on a healthy connection and keep it.
        if matches!(result, Err(PeerError::Transport(_))) {
            *conn = None;
        }
        result
    }

    async fn try_exchange(
        addr: &str,
        conn: &mut Option<TcpStream>,
        request: &GetRequest,
    ) -> Result<Bytes, PeerError> {
        if conn.is_none() {
            debug!(addr, "dialing peer");
            let stream = TcpStream::connect(addr).await.map_err(transport)?;
            *conn = Some(stream);
        }
        let stream = conn.as_mut().expect("connection just established");

        stream
            .write_all(&encode_frame(&request.encode()))
            .await
            .map_err(transport)?;

        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; 16 * 1024];
        loop {
            let n = stream.read(&mut buf).await.map_err(transport)?;
            if n == 0 {
                return Err(PeerError::Transport("connection closed by peer".to_string()));
            }
            decoder.feed(&buf[..n]);
            if let Some(frame) = decoder
                .decode()
                .map_err(|e| PeerError::Transport(e.to_string()))?
            {
                return match GetReply::decode(&frame) {
                    Some(GetReply::Value(value)) => Ok(value),
                    Some(GetReply::Error(message)) => Err(PeerError::Remote(message)),
                    None => Err(PeerError::Transport("malformed reply".to_string())),
                };
            }
        }
    }
}

impl Peer for PeerClient {
    fn get(&self, group: &str, key: &str) -> PeerFuture {
        let client = self.clone();
        let request = GetRequest {
            group: group.to_string(),
            key: key.to_string(),
        };
        Box::pin(async move {
            match tokio::time::timeout(client.inner.deadline, client.exchange(&request)).await {
                Ok(result) => result,
                Err(_) => {
                    // The cancelled exchange released the lock; whatever
                    // was in flight on the stream is unusable now.
                    *client.inner.conn.lock().await = None;
                    Err(PeerError::Transport(format!(
                        "deadline of {:?} exceeded",
                        client.inner.deadline
                    )))
                }
            }
        })
    }
}

fn transport(e: std::io::Error) -> PeerError {
    PeerError::Transport(e.to_string())
}
