//! Error types for wbot-core.

use thiserror::Error;

/// Input rejected at the orchestrator boundary.
///
/// A validation failure never changes state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid wallet address: expected {expected} characters, got {actual}")]
    InvalidAddressLength { expected: usize, actual: usize },

    #[error("Invalid bot settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Result type alias for validation.
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
