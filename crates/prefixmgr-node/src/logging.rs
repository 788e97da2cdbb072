//! Tracing subscriber configuration for the prefix manager.
//!
//! Log levels follow these conventions:
//! - ERROR: Startup failures the process cannot recover from
//! - WARN: Dropped malformed input, flooding store failures
//! - INFO: Lifecycle, aggregate install/uninstall, divergence republish
//! - DEBUG: Flush summaries, label and area deltas
//! - TRACE: Individual record publication

use tracing_subscriber::EnvFilter;

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` (the `[logging]` level
/// from the config file).
pub fn init(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize the tracing subscriber with JSON output.
///
/// Activated by setting `RUST_LOG_FORMAT=json`.
pub fn init_json(default_level: &str) {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_level))
        .init();
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` so repeated calls are harmless.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}
