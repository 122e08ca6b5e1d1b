//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,wbot=debug";

/// Initialize logging with the default filter.
///
/// `RUST_LOG` overrides the filter. `RUST_ENV=production` switches to JSON
/// output, anything else gets pretty output.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with_level(None)
}

/// Initialize logging, using `level` as the filter when `RUST_LOG` is unset.
pub fn init_logging_with_level(level: Option<&str>) -> TelemetryResult<()> {
    let fallback = level.unwrap_or(DEFAULT_FILTER);
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(fallback)
            .map_err(|e| TelemetryError::LoggingInit(format!("bad filter {fallback:?}: {e}")))?,
    };

    let is_production = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let result = if is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init()
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}
