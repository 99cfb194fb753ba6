//! Tracing subscriber setup
//!
//! The library only emits `tracing` events. Hosts install their own
//! subscriber; the developer binaries use [`init_tracing`].

use std::fs::File;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install a global stderr subscriber filtered by `RUST_LOG`, falling back
/// to `default_level` when the variable is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_level: LevelFilter) -> bool {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .try_init()
        .is_ok()
}

/// Build a subscriber that writes every event at `level` or above to `log_file`
pub fn build_file_subscriber(
    log_file: File,
    level: LevelFilter,
) -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Arc::new(log_file)).with_ansi(false))
        .with(level)
}
