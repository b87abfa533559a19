//! Eviction policy selection.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// The eviction discipline backing a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Recency-ordered: evict the least recently used entry.
    Lru,
    /// Frequency-ordered: evict the least frequently used entry.
    Lfu,
}

/// Error returned for a policy name other than `"lru"` or `"lfu"`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown eviction policy: {0:?} (expected \"lru\" or \"lfu\")")]
pub struct PolicyError(String);

impl FromStr for EvictionPolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lru" => Ok(EvictionPolicy::Lru),
            "lfu" => Ok(EvictionPolicy::Lfu),
            other => Err(PolicyError(other.to_string())),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Lru => f.write_str("lru"),
            EvictionPolicy::Lfu => f.write_str("lfu"),
        }
    }
}
