//! End-to-end cluster tests: several cache servers on loopback, keys
//! routed to their owners, hot keys replicated to non-owners.

use hashring::{DEFAULT_REPLICAS, Ring};
use meshcache::{ByteView, EvictionPolicy, Group, GroupRegistry, loader_fn};
use meshcache_server::CacheServer;
use protocol::{FrameDecoder, GetReply, GetRequest, encode_frame};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

fn db() -> HashMap<&'static str, &'static str> {
    HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
}

struct Node {
    server: Arc<CacheServer>,
    group: Arc<Group>,
    loads: Arc<AtomicUsize>,
    task: JoinHandle<Result<(), meshcache_server::ServerError>>,
}

/// Start one cluster node serving the `scores` group over [`db`].
fn spawn_node(addr: String, peers: Vec<String>) -> Node {
    let groups = Arc::new(GroupRegistry::new());
    let loads = Arc::new(AtomicUsize::new(0));
    let group = groups.new_group("scores", 2 << 10, EvictionPolicy::Lru, {
        let loads = loads.clone();
        loader_fn(move |key: String| {
            let loads = loads.clone();
            async move {
                match db().get(key.as_str()) {
                    Some(value) => {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok(value.as_bytes().to_vec())
                    }
                    None => Err(format!("{key} not exist").into()),
                }
            }
        })
    });

    let server = Arc::new(CacheServer::new(addr, groups));
    server.set_peers(&peers);
    group.register_peers(server.clone());

    let task = tokio::spawn({
        let server = server.clone();
        async move { server.start().await }
    });

    Node {
        server,
        group,
        loads,
        task,
    }
}

fn free_addrs(n: usize) -> Vec<String> {
    // Bind ephemeral listeners to reserve distinct ports, then release.
    let listeners: Vec<_> = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().to_string())
        .collect()
}

async fn wait_for(addr: &str) {
    for _ in 0..200 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server at {addr} did not come up");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cluster_routes_to_owner_and_promotes_hot_keys() {
    let peers = free_addrs(3);
    let nodes: Vec<Node> = peers
        .iter()
        .map(|addr| spawn_node(addr.clone(), peers.clone()))
        .collect();
    for addr in &peers {
        wait_for(addr).await;
    }

    // Compute the owner the same way every node does.
    let mut ring = Ring::new(DEFAULT_REPLICAS);
    ring.add(&peers);
    let owner_addr = ring.get("Tom").unwrap().to_string();
    let owner = peers.iter().position(|p| *p == owner_addr).unwrap();
    let probe = (owner + 1) % nodes.len();

    // A get on a non-owner peer runs exactly one RPC to the owner, and
    // exactly one loader invocation, on the owner.
    let value = nodes[probe].group.get("Tom").await.unwrap();
    assert_eq!(value, ByteView::from("630"));
    assert_eq!(nodes[owner].loads.load(Ordering::SeqCst), 1);
    assert_eq!(nodes[probe].loads.load(Ordering::SeqCst), 0);

    // Nine more remote hits within the first minute cross the promotion
    // threshold; the key lands in the non-owner's hot cache.
    for _ in 0..9 {
        let value = nodes[probe].group.get("Tom").await.unwrap();
        assert_eq!(value, ByteView::from("630"));
    }
    assert_eq!(nodes[probe].group.hot_cache_len(), 1);
    // The owner kept serving from its main cache.
    assert_eq!(nodes[owner].loads.load(Ordering::SeqCst), 1);

    // With the owner gone, the hot cache answers with zero RPCs.
    nodes[owner].server.stop();
    let value = nodes[probe].group.get("Tom").await.unwrap();
    assert_eq!(value, ByteView::from("630"));
    assert_eq!(nodes[probe].loads.load(Ordering::SeqCst), 0);

    for node in nodes {
        node.server.stop();
        let _ = node.task.await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_node_answers_for_every_key() {
    let peers = free_addrs(3);
    let nodes: Vec<Node> = peers
        .iter()
        .map(|addr| spawn_node(addr.clone(), peers.clone()))
        .collect();
    for addr in &peers {
        wait_for(addr).await;
    }

    for node in &nodes {
        for (key, value) in db() {
            assert_eq!(node.group.get(key).await.unwrap(), ByteView::from(value));
        }
    }
    // Each key was loaded exactly once, cluster-wide.
    let total: usize = nodes.iter().map(|n| n.loads.load(Ordering::SeqCst)).sum();
    assert_eq!(total, db().len());

    for node in nodes {
        node.server.stop();
        let _ = node.task.await;
    }
}

/// Send one framed request and read back one framed reply.
async fn roundtrip(stream: &mut TcpStream, request: GetRequest) -> GetReply {
    stream
        .write_all(&encode_frame(&request.encode()))
        .await
        .unwrap();

    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "server hung up");
        decoder.feed(&buf[..n]);
        if let Some(frame) = decoder.decode().unwrap() {
            return GetReply::decode(&frame).unwrap();
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rpc_surface_validates_requests() {
    let peers = free_addrs(1);
    let node = spawn_node(peers[0].clone(), peers.clone());
    wait_for(&peers[0]).await;

    let mut stream = TcpStream::connect(&peers[0]).await.unwrap();

    let reply = roundtrip(
        &mut stream,
        GetRequest {
            group: "scores".to_string(),
            key: "Tom".to_string(),
        },
    )
    .await;
    assert_eq!(reply, GetReply::Value(bytes::Bytes::from_static(b"630")));

    let reply = roundtrip(
        &mut stream,
        GetRequest {
            group: "scores".to_string(),
            key: String::new(),
        },
    )
    .await;
    match reply {
        GetReply::Error(message) => assert!(message.contains("key is required")),
        other => panic!("expected error, got {other:?}"),
    }

    let reply = roundtrip(
        &mut stream,
        GetRequest {
            group: "nope".to_string(),
            key: "Tom".to_string(),
        },
    )
    .await;
    match reply {
        GetReply::Error(message) => assert!(message.contains("group not found")),
        other => panic!("expected error, got {other:?}"),
    }

    // Loader failures surface verbatim as protocol errors.
    let reply = roundtrip(
        &mut stream,
        GetRequest {
            group: "scores".to_string(),
            key: "Ghost".to_string(),
        },
    )
    .await;
    match reply {
        GetReply::Error(message) => assert!(message.contains("Ghost not exist")),
        other => panic!("expected error, got {other:?}"),
    }

    node.server.stop();
    let _ = node.task.await;
}
