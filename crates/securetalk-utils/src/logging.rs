//! `tracing` initialization shared by every binary in the workspace.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber::fmt` subscriber. `default_level` is used
/// when `RUST_LOG` is unset; an explicit `RUST_LOG` always wins.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
