//! Logging initialization for the `docpack` binary.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Map the `-q` count to the default level: info, then warn, then error.
pub fn level_for_quiet(quiet: u8) -> Level {
    match quiet {
        0 => Level::INFO,
        1 => Level::WARN,
        _ => Level::ERROR,
    }
}

/// Install a compact stderr subscriber.
///
/// `RUST_LOG` takes precedence over the level derived from `-q`.
pub fn init_logging(quiet: u8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docpack={}", level_for_quiet(quiet))));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
