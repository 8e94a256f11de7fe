//! Video generation job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::GenerateVideoRequest;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status of a video job.
///
/// `Processing` is the only non-terminal state. `Completed` and `Failed`
/// are absorbing: once reached, the record never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Credit has been debited and media generation is in flight
    #[default]
    Processing,
    /// Video was generated successfully
    Completed,
    /// Generation failed and the credit was returned
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the stored string form. Unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Processing, JobStatus::Completed) | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted video generation job.
///
/// Stored at `videoJobs/{id}`. `owner_id`, `request` and `style_seed` are
/// fixed at creation; the result fields are only ever written by the job
/// runner.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    /// Unique job ID
    pub id: JobId,

    /// User who paid for the job
    #[serde(rename = "uid")]
    pub owner_id: String,

    /// Request parameters as supplied by the caller
    pub request: GenerateVideoRequest,

    /// Seed used for randomized prompt styling
    pub style_seed: u64,

    /// Current status
    pub status: JobStatus,

    /// Intermediate still image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Final video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Creation timestamp (assigned by the store)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last update timestamp (assigned by the store)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Completion timestamp (assigned by the store)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    /// Create a fresh job in `Processing` status with no result fields.
    pub fn new(id: JobId, owner_id: impl Into<String>, request: GenerateVideoRequest, style_seed: u64) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            request,
            style_seed,
            status: JobStatus::Processing,
            image_url: None,
            video_url: None,
            error: None,
            created_at: None,
            updated_at: None,
            completed_at: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [JobStatus::Processing, JobStatus::Completed, JobStatus::Failed] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("queued"), None);
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());

        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_new_job_has_no_results() {
        let request = GenerateVideoRequest::with_attribute("Fire");
        let job = VideoJob::new(JobId::new(), "user-1", request, 7);
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.image_url.is_none());
        assert!(job.video_url.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let request = GenerateVideoRequest::with_attribute("Water");
        let job = VideoJob::new(JobId::from_string("job-1"), "user-1", request, 42);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["uid"], "user-1");
        assert_eq!(json["styleSeed"], 42);
        assert_eq!(json["status"], "processing");
        assert!(json.get("videoUrl").is_none());
    }
}
