//! Server lifecycle tests: start/stop semantics, restart, registry
//! registration.

use meshcache::GroupRegistry;
use meshcache_server::{CacheServer, LocalRegistry, ServerError, ServiceRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
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

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn double_start_is_rejected() {
    let addr = free_addr();
    let server = Arc::new(CacheServer::new(addr.clone(), Arc::new(GroupRegistry::new())));

    let task = tokio::spawn({
        let server = server.clone();
        async move { server.start().await }
    });
    wait_for(&addr).await;

    assert!(matches!(
        server.start().await,
        Err(ServerError::AlreadyRunning)
    ));

    server.stop();
    task.await.unwrap().unwrap();
    assert!(!server.is_running());
}

#[tokio::test]
async fn stop_without_start_is_a_no_op() {
    let server = Arc::new(CacheServer::new(free_addr(), Arc::new(GroupRegistry::new())));
    server.stop();
    server.stop();
    assert!(!server.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_after_stop() {
    let addr = free_addr();
    let server = Arc::new(CacheServer::new(addr.clone(), Arc::new(GroupRegistry::new())));

    for _ in 0..2 {
        let task = tokio::spawn({
            let server = server.clone();
            async move { server.start().await }
        });
        wait_for(&addr).await;
        assert!(server.is_running());

        server.stop();
        task.await.unwrap().unwrap();
        assert!(!server.is_running());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bind_failure_leaves_the_server_stopped() {
    let addr = free_addr();
    // Squat on the port so the server cannot bind it.
    let _occupier = tokio::net::TcpListener::bind(&addr).await.unwrap();

    let server = Arc::new(CacheServer::new(addr, Arc::new(GroupRegistry::new())));
    assert!(matches!(
        server.start().await,
        Err(ServerError::Bind(_, _))
    ));
    assert!(!server.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registration_follows_the_server_lifecycle() {
    let addr = free_addr();
    let registry = LocalRegistry::new();
    let server = Arc::new(
        CacheServer::new(addr.clone(), Arc::new(GroupRegistry::new()))
            .with_registry("meshcache", registry.clone()),
    );

    let task = tokio::spawn({
        let server = server.clone();
        async move { server.start().await }
    });
    wait_for(&addr).await;

    // The keep-alive task announces the node shortly after startup.
    let expected: std::net::SocketAddr = addr.parse().unwrap();
    let mut registered = false;
    for _ in 0..100 {
        if registry.lookup("meshcache").contains(&expected) {
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(registered, "server never registered");

    server.stop();
    task.await.unwrap().unwrap();

    // Deregistration follows the stop signal.
    let mut deregistered = false;
    for _ in 0..100 {
        if !registry.lookup("meshcache").contains(&expected) {
            deregistered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(deregistered, "server never deregistered");
}
