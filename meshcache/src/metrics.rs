//! Cache controller metrics.

use metriken::{Counter, metric};

#[metric(name = "cache_hot_hits", description = "Gets served from the hot cache")]
pub static HOT_HITS: Counter = Counter::new();

#[metric(name = "cache_main_hits", description = "Gets served from the main cache")]
pub static MAIN_HITS: Counter = Counter::new();

#[metric(name = "cache_loads", description = "Misses that entered the load path")]
pub static LOADS: Counter = Counter::new();

#[metric(name = "cache_peer_fetches", description = "Values fetched from a remote peer")]
pub static PEER_FETCHES: Counter = Counter::new();

#[metric(
    name = "cache_peer_fallbacks",
    description = "Peer fetches that failed and fell back to the local loader"
)]
pub static PEER_FALLBACKS: Counter = Counter::new();

#[metric(
    name = "cache_hot_promotions",
    description = "Keys copied into the hot cache by the QPS policy"
)]
pub static HOT_PROMOTIONS: Counter = Counter::new();
