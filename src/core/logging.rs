//! Logging initialization.
//!
//! One-shot `tracing` setup for the CLI: compact formatter on stderr,
//! filterable with `RUST_LOG`, defaulting to `info`.

use tracing_subscriber::EnvFilter;

/// Initialize the logging system.
///
/// Safe to call more than once; later calls are no-ops (relevant in tests,
/// where several cases may initialize logging).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
