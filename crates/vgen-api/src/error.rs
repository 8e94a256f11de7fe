//! API error types.
//!
//! Errors are rendered in the callable protocol's envelope:
//! `{"error": {"status": "INVALID_ARGUMENT", "message": "..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use vgen_worker::BeginJobError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Firestore error: {0}")]
    Firestore(#[from] vgen_firestore::FirestoreError),
}

impl ApiError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Canonical status name used in the error envelope.
    pub fn status(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::FailedPrecondition(_) => "FAILED_PRECONDITION",
            ApiError::RateLimited => "RESOURCE_EXHAUSTED",
            ApiError::Internal(_) | ApiError::Firestore(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidArgument(_) | ApiError::FailedPrecondition(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) | ApiError::Firestore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, ApiError::Internal(_) | ApiError::Firestore(_))
    }
}

impl From<BeginJobError> for ApiError {
    fn from(err: BeginJobError) -> Self {
        match err {
            BeginJobError::InvalidArgument(e) => ApiError::InvalidArgument(e.to_string()),
            BeginJobError::UserNotFound(_) => ApiError::NotFound(err.to_string()),
            BeginJobError::InsufficientCredits => ApiError::FailedPrecondition(err.to_string()),
            BeginJobError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        // Don't expose internal error details in production
        let message = if self.is_internal() {
            error!(error = %self, "Request failed with internal error");
            if std::env::var("ENVIRONMENT")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false)
            {
                "An internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        let body = ErrorEnvelope {
            error: ErrorBody {
                status: self.status(),
                message,
            },
        };

        (status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use vgen_models::RequestError;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_begin_job_errors_map_to_callable_statuses() {
        let (status, body) = render(BeginJobError::InsufficientCredits.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["status"], "FAILED_PRECONDITION");
        assert_eq!(body["error"]["message"], "No credits");

        let (status, body) = render(BeginJobError::UserNotFound("u1".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["status"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "User not found");

        let (status, body) =
            render(BeginJobError::InvalidArgument(RequestError::InvalidDuration(7)).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");
    }

    #[tokio::test]
    async fn test_unauthenticated_envelope() {
        let (status, body) = render(ApiError::unauthenticated("Login required")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["status"], "UNAUTHENTICATED");
        assert_eq!(body["error"]["message"], "Login required");
    }

    #[tokio::test]
    #[serial]
    async fn test_internal_detail_hidden_in_production() {
        std::env::set_var("ENVIRONMENT", "production");
        let (status, body) = render(ApiError::internal("commit contention on users/u1")).await;
        std::env::remove_var("ENVIRONMENT");

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["status"], "INTERNAL");
        assert_eq!(body["error"]["message"], "An internal error occurred");

        let (_, body) = render(ApiError::internal("commit contention")).await;
        assert_eq!(body["error"]["message"], "Internal error: commit contention");
    }
}
