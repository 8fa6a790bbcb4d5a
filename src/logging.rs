//! Tracing setup for applications and tests

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global subscriber printing `info` (or `debug` when `verbose`)
/// and above. `RUST_LOG` overrides the level. Returns false when a
/// subscriber was already installed.
pub fn init_logging(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok()
}
