//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG`
///
/// `default_directive` (e.g. `"toolweave_core=debug"`) applies when `RUST_LOG`
/// is unset or unparsable. Returns `false` when a global subscriber was
/// already installed, so calling this more than once is harmless.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
