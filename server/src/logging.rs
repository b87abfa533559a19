//! Structured logging initialization.
//!
//! Configures the tracing subscriber. The `RUST_LOG` environment
//! variable takes precedence over the configuration file level.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize the logging subsystem.
///
/// Safe to call once per process; later calls are ignored (the first
/// subscriber wins), which keeps test binaries that share a process
/// happy.
pub fn init(config: &LoggingConfig) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(&config.level)
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry.with(fmt::layer().with_ansi(true)).try_init(),
        (LogFormat::Pretty, false) => registry
            .with(fmt::layer().with_ansi(true).without_time())
            .try_init(),
        (LogFormat::Json, true) => registry.with(fmt::layer().json()).try_init(),
        (LogFormat::Json, false) => registry.with(fmt::layer().json().without_time()).try_init(),
    };
    // A subscriber may already be installed (tests, embedding apps).
    let _ = result;
}
