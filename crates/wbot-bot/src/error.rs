//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Health error: {0}")]
    Health(#[from] wbot_health::HealthError),

    #[error("Session error: {0}")]
    Session(#[from] wbot_session::SessionError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] wbot_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
