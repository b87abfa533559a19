//! Cache peer node.
//!
//! Loads a TOML configuration, builds the configured groups (each backed
//! by its inline source table), joins the static peer membership, and
//! serves peer RPCs until interrupted.

use clap::Parser;
use meshcache::{GroupRegistry, loader_fn};
use meshcache_server::{CacheServer, Config, LocalRegistry, logging};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "meshcached", about = "meshcache peer node", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "meshcached.toml")]
    config: PathBuf,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the configured peer list (comma-separated addresses).
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(port) = args.port {
        config.listen.set_port(port);
    }
    if !args.peers.is_empty() {
        config.peers = args.peers;
    }
    logging::init(&config.logging);

    let groups = Arc::new(GroupRegistry::new());
    for group_config in &config.group {
        let source = Arc::new(group_config.source.clone());
        let name = group_config.name.clone();
        groups.new_group(
            &group_config.name,
            group_config.cache_bytes,
            group_config.policy,
            loader_fn(move |key: String| {
                let source = source.clone();
                let name = name.clone();
                async move {
                    info!(group = %name, key = %key, "loading from source table");
                    match source.get(&key) {
                        Some(value) => Ok(value.clone().into_bytes()),
                        None => Err(format!("{key} not exist").into()),
                    }
                }
            }),
        );
    }

    let server = Arc::new(
        CacheServer::new(config.listen.to_string(), groups.clone())
            .with_registry(&config.service, LocalRegistry::new()),
    );

    let peers = if config.peers.is_empty() {
        vec![config.listen.to_string()]
    } else {
        config.peers.clone()
    };
    server.set_peers(&peers);

    for group_config in &config.group {
        if let Some(group) = groups.get_group(&group_config.name) {
            group.register_peers(server.clone());
        }
    }

    tokio::select! {
        result = server.start() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            server.stop();
        }
    }
    Ok(())
}
