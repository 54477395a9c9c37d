//! Log output for plugin binaries.
//!
//! The bridge only emits `tracing` events; nothing is printed until a
//! subscriber is installed. Hosts load many plugins into one process, so
//! installation never replaces a subscriber that is already there.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "warn,plugbridge=info";

/// Install a stderr subscriber filtered by `RUST_LOG`.
///
/// Returns `false` when another subscriber was already installed.
pub fn init() -> bool {
    init_with_filter(DEFAULT_FILTER)
}

/// Like [`init`], with `fallback` as the filter when `RUST_LOG` is unset.
pub fn init_with_filter(fallback: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
        .is_ok()
}
