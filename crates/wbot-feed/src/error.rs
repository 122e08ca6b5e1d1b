//! Feed error types.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
