//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber printing to stderr.
///
/// `RUST_LOG` wins over `default_filter` when it is set. Returns `false`
/// if a global subscriber was already installed, in which case nothing
/// changes.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
