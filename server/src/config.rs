//! Server configuration.
//!
//! Loaded from a TOML file: listen address, service name, static peer
//! membership, per-group cache settings, and logging.

use mesh_cache::EvictionPolicy;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

/// Node configuration loaded from a TOML file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Address this node listens on and announces to its peers.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Service name used for registry registration.
    #[serde(default = "default_service")]
    pub service: String,

    /// Static peer membership (addresses of every node, this one
    /// included). Empty means single-node.
    #[serde(default)]
    pub peers: Vec<String>,

    /// Cache groups served by this node.
    #[serde(default)]
    pub group: Vec<GroupConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One cache group.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Group name; peers address the group by it.
    pub name: String,

    /// Byte budget of the main cache. The hot cache gets an eighth.
    #[serde(default = "default_cache_bytes")]
    pub cache_bytes: u64,

    /// Eviction policy: "lru" or "lfu".
    #[serde(default = "default_policy")]
    pub policy: EvictionPolicy,

    /// Inline backing table served by this node's loader. Stands in for
    /// a slow backing store in demos and tests.
    #[serde(default)]
    pub source: HashMap<String, String>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level filter when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps in output.
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            timestamps: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output with ANSI colors.
    #[default]
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

/// Configuration loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

fn default_listen() -> SocketAddr {
    "127.0.0.1:7001".parse().expect("valid default address")
}

fn default_service() -> String {
    "meshcache".to_string()
}

fn default_cache_bytes() -> u64 {
    2 << 10
}

fn default_policy() -> EvictionPolicy {
    EvictionPolicy::Lru
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            listen = "127.0.0.1:8001"
            service = "scores-cache"
            peers = ["127.0.0.1:8001", "127.0.0.1:8002"]

            [[group]]
            name = "scores"
            cache_bytes = 2048
            policy = "lfu"

            [group.source]
            Tom = "630"
            Jack = "589"

            [logging]
            level = "debug"
            format = "json"
            timestamps = false
            "#,
        )
        .unwrap();

        assert_eq!(config.listen.port(), 8001);
        assert_eq!(config.service, "scores-cache");
        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.group.len(), 1);
        assert_eq!(config.group[0].policy, EvictionPolicy::Lfu);
        assert_eq!(config.group[0].source["Tom"], "630");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.timestamps);
    }

    #[test]
    fn defaults_fill_everything() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listen.port(), 7001);
        assert_eq!(config.service, "meshcache");
        assert!(config.peers.is_empty());
        assert!(config.group.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("listne = \"127.0.0.1:1\"").is_err());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = toml::from_str::<Config>(
            r#"
            [[group]]
            name = "scores"
            policy = "arc"
            "#,
        );
        assert!(result.is_err());
    }
}
