//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Initialise logging. The default level is `info`, or `debug` when debug
/// logging is enabled in the configuration. `RUST_LOG` takes precedence
/// over both.
pub fn init(debug: bool) {
    let level = if debug { "debug" } else { "info" };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .try_init();
}
