//! Media client error types.

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid media client configuration: {0}")]
    Config(String),

    #[error("Upstream returned {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Upstream timed out after {0} seconds")]
    Timeout(u64),

    #[error("Upstream response has no {0} URL")]
    MissingResult(&'static str),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid upstream response: {0}")]
    Json(#[from] serde_json::Error),
}

impl MediaError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MediaError::Config(_) => "config",
            MediaError::RequestFailed { .. } => "request_failed",
            MediaError::Timeout(_) => "timeout",
            MediaError::MissingResult(_) => "missing_result",
            MediaError::Network(_) => "network",
            MediaError::Json(_) => "invalid_json",
        }
    }
}
