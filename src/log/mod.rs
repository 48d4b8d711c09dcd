// tracing_setup.rs
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize tracing subscriber with default environment-based configuration.
///
/// Reads configuration from environment variables:
/// - `PARDON_LOG_LEVEL`: Sets the log level (e.g., "info", "debug", "trace")
/// - `PARDON_LOG_FORMAT`: Set to "json" for JSON output, otherwise uses human-readable format
/// - Falls back to `RUST_LOG` if `PARDON_LOG_LEVEL` is not set
/// - Defaults to "info" level if neither is set
pub fn init_tracing() {
    let level = std::env::var("PARDON_LOG_LEVEL").ok();
    let use_json = std::env::var("PARDON_LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    init_tracing_with(level.as_deref(), use_json);
}

/// Initialize tracing subscriber with explicit configuration options.
///
/// * `level` - Optional log level string. If `None`, falls back to `RUST_LOG`
///   environment variable or defaults to "info"
/// * `use_json` - If `true`, enables JSON formatter for structured logging.
pub fn init_tracing_with(level: Option<&str>, use_json: bool) {
    let filter = match level {
        Some(lvl) => EnvFilter::new(lvl),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    if use_json {
        let subscriber = Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(ErrorLayer::default());

        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = Registry::default()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(ErrorLayer::default());

        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
