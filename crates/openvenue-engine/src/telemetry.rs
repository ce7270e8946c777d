//! Tracing subscriber setup.

use openvenue_types::{OpenvenueError, Result};
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,openvenue_engine=debug";

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// With `json` set, every event is written as one JSON object per line.
///
/// # Errors
/// `Configuration` if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| OpenvenueError::Configuration(format!("tracing already initialized: {e}")))
}
