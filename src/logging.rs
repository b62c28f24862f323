//! `tracing` subscriber setup.
//!
//! Events go to stderr so that command output on stdout stays
//! machine-readable. `RUST_LOG` overrides the configured level.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
