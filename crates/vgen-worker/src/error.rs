//! Worker error types.

use thiserror::Error;
use vgen_firestore::FirestoreError;
use vgen_media_client::MediaError;
use vgen_models::RequestError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Caller-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorKind {
    /// Bad input, no side effects
    InvalidArgument,
    /// User record missing, no side effects
    NotFound,
    /// Balance exhausted, no side effects
    InsufficientCredits,
    /// Media service failed or returned nothing usable
    Upstream,
    /// Anything else
    Internal,
}

impl JobErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobErrorKind::InvalidArgument => "invalid_argument",
            JobErrorKind::NotFound => "not_found",
            JobErrorKind::InsufficientCredits => "insufficient_credits",
            JobErrorKind::Upstream => "upstream",
            JobErrorKind::Internal => "internal",
        }
    }
}

/// Errors raised while running a job after it was accepted.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] MediaError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),

    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),
}

impl WorkerError {
    pub fn dispatch_failed(msg: impl Into<String>) -> Self {
        Self::DispatchFailed(msg.into())
    }

    pub fn kind(&self) -> JobErrorKind {
        match self {
            WorkerError::Upstream(_) => JobErrorKind::Upstream,
            _ => JobErrorKind::Internal,
        }
    }
}

/// Synchronous rejections from `begin_job`. None of them leave state behind
/// except `Internal` raised after a failed dispatch, which has already been
/// compensated.
#[derive(Debug, Error)]
pub enum BeginJobError {
    #[error("{0}")]
    InvalidArgument(#[from] RequestError),

    #[error("User not found")]
    UserNotFound(String),

    #[error("No credits")]
    InsufficientCredits,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BeginJobError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> JobErrorKind {
        match self {
            BeginJobError::InvalidArgument(_) => JobErrorKind::InvalidArgument,
            BeginJobError::UserNotFound(_) => JobErrorKind::NotFound,
            BeginJobError::InsufficientCredits => JobErrorKind::InsufficientCredits,
            BeginJobError::Internal(_) => JobErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_job_error_kinds() {
        assert_eq!(
            BeginJobError::from(RequestError::MissingInput).kind(),
            JobErrorKind::InvalidArgument
        );
        assert_eq!(
            BeginJobError::UserNotFound("u".into()).kind(),
            JobErrorKind::NotFound
        );
        assert_eq!(
            BeginJobError::InsufficientCredits.kind(),
            JobErrorKind::InsufficientCredits
        );
        assert_eq!(BeginJobError::internal("x").kind(), JobErrorKind::Internal);
    }

    #[test]
    fn test_worker_error_kinds() {
        let upstream = WorkerError::from(MediaError::MissingResult("image"));
        assert_eq!(upstream.kind(), JobErrorKind::Upstream);
        assert_eq!(
            WorkerError::dispatch_failed("queue closed").kind(),
            JobErrorKind::Internal
        );
    }
}
