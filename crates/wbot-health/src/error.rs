//! Health error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Malformed status response: {0}")]
    Malformed(String),

    #[error("Duplicate dependency name: {0}")]
    DuplicateDependency(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),
}

pub type HealthResult<T> = Result<T, HealthError>;
