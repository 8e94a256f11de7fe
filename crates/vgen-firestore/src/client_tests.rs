//! Tests for Firestore client plumbing: status mapping, retry policy and
//! commit request encoding.

use std::collections::HashMap;
use std::time::Duration;

use serial_test::serial;

use crate::client::FirestoreConfig;
use crate::error::FirestoreError;
use crate::retry::RetryConfig;
use crate::types::{CommitRequest, CommitResponse, FieldTransform, Precondition, ToFirestoreValue, Write};

fn test_config() -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 3,
            base_delay_ms: 10,
            max_delay_ms: 100,
        },
    }
}

#[test]
fn test_error_from_http_status_429() {
    let err = FirestoreError::from_http_status(429, "rate limited");
    assert!(matches!(err, FirestoreError::RateLimited(_)));
    assert!(err.is_retryable());
    assert!(err.retry_after_ms().is_some());
}

#[test]
fn test_error_from_http_status_5xx() {
    for code in [500, 502, 503] {
        let err = FirestoreError::from_http_status(code, "unavailable");
        assert!(matches!(err, FirestoreError::ServerError(c, _) if c == code));
        assert!(err.is_retryable());
        assert_eq!(err.http_status(), Some(code));
    }
}

#[test]
fn test_error_from_http_status_400() {
    let err = FirestoreError::from_http_status(400, "bad request");
    assert!(matches!(err, FirestoreError::RequestFailed(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_stale_update_time_is_precondition_failure() {
    let body = r#"{"error":{"code":400,"status":"FAILED_PRECONDITION","message":"the stored version does not match the required base version"}}"#;
    let err = FirestoreError::from_http_status(400, body);
    assert!(err.is_precondition_failed());
    assert!(!err.is_retryable());
}

#[test]
fn test_contended_commit_is_precondition_failure() {
    let err = FirestoreError::from_http_status(409, r#"{"error":{"status":"ABORTED"}}"#);
    assert!(err.is_precondition_failed());

    let err = FirestoreError::from_http_status(409, r#"{"error":{"status":"ALREADY_EXISTS"}}"#);
    assert!(matches!(err, FirestoreError::AlreadyExists(_)));
}

#[test]
fn test_error_from_http_status_404_and_auth() {
    assert!(FirestoreError::from_http_status(404, "missing").is_not_found());
    assert!(matches!(
        FirestoreError::from_http_status(401, "expired"),
        FirestoreError::AuthError(_)
    ));
    assert!(matches!(
        FirestoreError::from_http_status(403, "denied"),
        FirestoreError::PermissionDenied(_)
    ));
}

#[test]
fn test_documents_root_uses_database_id() {
    let mut config = test_config();
    config.database_id = "videos".to_string();
    assert_eq!(
        config.documents_root(),
        "projects/test-project/databases/videos/documents"
    );
}

#[test]
#[serial]
fn test_retry_config_from_env() {
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "25");
    std::env::set_var("FIRESTORE_RETRY_MAX_MS", "400");
    let config = RetryConfig::from_env();
    assert_eq!(config.base_delay_ms, 25);
    assert_eq!(config.max_delay_ms, 400);
    std::env::remove_var("FIRESTORE_RETRY_BASE_MS");
    std::env::remove_var("FIRESTORE_RETRY_MAX_MS");
}

#[test]
fn test_debit_and_create_commit_body() {
    let root = test_config().documents_root();
    let user = format!("{}/users/u1", root);
    let job = format!("{}/videoJobs/j1", root);

    let request = CommitRequest {
        writes: vec![
            Write::merge(
                user,
                HashMap::from([("credits".to_string(), 4i64.to_firestore_value())]),
            )
            .with_precondition(Precondition::updated_at("2025-01-01T00:00:00.000001Z")),
            Write::create(
                job,
                HashMap::from([("status".to_string(), "processing".to_firestore_value())]),
            )
            .with_transform(FieldTransform::request_time("createdAt")),
        ],
    };

    let json = serde_json::to_value(&request).unwrap();
    let writes = json["writes"].as_array().unwrap();
    assert_eq!(writes.len(), 2);

    assert_eq!(writes[0]["updateMask"]["fieldPaths"][0], "credits");
    assert_eq!(writes[0]["update"]["fields"]["credits"]["integerValue"], "4");
    assert_eq!(
        writes[0]["currentDocument"]["updateTime"],
        "2025-01-01T00:00:00.000001Z"
    );
    assert!(writes[0].get("updateTransforms").is_none());

    assert_eq!(writes[1]["currentDocument"]["exists"], false);
    assert_eq!(writes[1]["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
}

#[test]
fn test_commit_response_parsing() {
    let body = r#"{
        "writeResults": [{"updateTime": "2025-01-01T00:00:01Z"}, {}],
        "commitTime": "2025-01-01T00:00:01Z"
    }"#;
    let response: CommitResponse = serde_json::from_str(body).unwrap();
    assert_eq!(response.write_results.len(), 2);
    assert!(response.write_results[1].update_time.is_none());
    assert_eq!(response.commit_time.as_deref(), Some("2025-01-01T00:00:01Z"));
}
