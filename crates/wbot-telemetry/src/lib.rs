//! Prometheus metrics and structured logging for the wallet bot.
//!
//! - Structured logging with `tracing` (JSON in production)
//! - Prometheus gauges/counters for health, bot lifecycle, refresh failures
//!   and decision outcomes

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with_level};
pub use metrics::Metrics;
