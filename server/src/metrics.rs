//! Cache server metrics.

use metriken::{Counter, Gauge, metric};

#[metric(
    name = "connections_accepted",
    description = "Total number of peer connections accepted"
)]
pub static CONNECTIONS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "connections_active",
    description = "Number of currently active peer connections"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

#[metric(name = "rpc_requests", description = "Total RPC get requests received")]
pub static REQUESTS: Counter = Counter::new();

#[metric(
    name = "rpc_request_errors",
    description = "RPC requests answered with a protocol error"
)]
pub static REQUEST_ERRORS: Counter = Counter::new();
