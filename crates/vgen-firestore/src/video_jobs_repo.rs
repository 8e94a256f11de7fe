//! Video job records (`videoJobs/{jobId}`).
//!
//! Jobs are created inside the caller's debit transaction and afterwards
//! only move forward: `processing` to `completed` or `failed`. Every update
//! re-reads the record and commits against its `updateTime`, so two racing
//! terminal writes cannot both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vgen_models::{GenerateVideoRequest, JobId, JobStatus, VideoJob};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_contention;
use crate::store::DocumentStore;
use crate::transaction::Transaction;
use crate::types::{
    Document, FieldTransform, Precondition, ToFirestoreValue, Value, Write,
};

pub const VIDEO_JOBS_COLLECTION: &str = "videoJobs";

/// Maximum attempts for a contended status update.
const MAX_UPDATE_RETRIES: u32 = 5;

/// Base delay for linear backoff between attempts (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 50;

mod field {
    pub const UID: &str = "uid";
    pub const PROMPT: &str = "prompt";
    pub const USER_PROMPT: &str = "userPrompt";
    pub const ATTRIBUTE: &str = "attribute";
    pub const DURATION: &str = "duration";
    pub const STYLE_SEED: &str = "styleSeed";
    pub const STATUS: &str = "status";
    pub const IMAGE_URL: &str = "imageUrl";
    pub const VIDEO_URL: &str = "videoUrl";
    pub const ERROR: &str = "error";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const COMPLETED_AT: &str = "completedAt";
}

/// Result of a conditional update on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// This call performed the update.
    Transitioned,
    /// The job was already terminal; nothing was written.
    AlreadyTerminal(JobStatus),
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Transition::Transitioned)
    }
}

#[derive(Clone)]
pub struct VideoJobRepository {
    store: Arc<dyn DocumentStore>,
}

impl VideoJobRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stage creation of a new `processing` job on `tx`.
    ///
    /// The write carries `exists = false`, so a colliding id aborts the
    /// whole transaction instead of overwriting a record.
    pub fn stage_create(
        &self,
        tx: &mut Transaction<'_>,
        owner_id: &str,
        request: &GenerateVideoRequest,
        style_seed: u64,
    ) -> JobId {
        let job_id = JobId::new();

        let mut fields = HashMap::new();
        fields.insert(field::UID.to_string(), owner_id.to_firestore_value());
        fields.insert(field::PROMPT.to_string(), request.display_prompt().to_firestore_value());
        if let Some(attribute) = request.attribute_tag() {
            fields.insert(field::ATTRIBUTE.to_string(), attribute.to_firestore_value());
        }
        if let Some(prompt) = request.custom_prompt() {
            fields.insert(field::USER_PROMPT.to_string(), prompt.to_firestore_value());
        }
        fields.insert(
            field::DURATION.to_string(),
            request.video_duration().as_secs().to_firestore_value(),
        );
        fields.insert(field::STYLE_SEED.to_string(), style_seed.to_firestore_value());
        fields.insert(
            field::STATUS.to_string(),
            JobStatus::Processing.as_str().to_firestore_value(),
        );

        let name = tx.document_name(VIDEO_JOBS_COLLECTION, job_id.as_str());
        tx.stage(
            Write::create(name, fields)
                .with_transform(FieldTransform::request_time(field::CREATED_AT))
                .with_transform(FieldTransform::request_time(field::UPDATED_AT)),
        );

        job_id
    }

    /// Point read of a job.
    pub async fn get(&self, job_id: &JobId) -> FirestoreResult<Option<VideoJob>> {
        self.store
            .get_document(VIDEO_JOBS_COLLECTION, job_id.as_str())
            .await?
            .map(|doc| job_from_document(job_id, &doc))
            .transpose()
    }

    /// Attach the intermediate image while the job is still processing.
    pub async fn record_image(&self, job_id: &JobId, image_url: &str) -> FirestoreResult<Transition> {
        let fields = HashMap::from([(field::IMAGE_URL.to_string(), image_url.to_firestore_value())]);
        self.update_while_processing(job_id, "record_image", fields, &[field::UPDATED_AT])
            .await
    }

    /// `processing -> completed`, setting the video reference.
    pub async fn mark_completed(&self, job_id: &JobId, video_url: &str) -> FirestoreResult<Transition> {
        let fields = HashMap::from([
            (
                field::STATUS.to_string(),
                JobStatus::Completed.as_str().to_firestore_value(),
            ),
            (field::VIDEO_URL.to_string(), video_url.to_firestore_value()),
        ]);
        let outcome = self
            .update_while_processing(
                job_id,
                "mark_completed",
                fields,
                &[field::UPDATED_AT, field::COMPLETED_AT],
            )
            .await?;

        if outcome.applied() {
            info!(job_id = %job_id, "Job completed");
        }
        Ok(outcome)
    }

    /// `processing -> failed`, recording the reason.
    pub async fn mark_failed(&self, job_id: &JobId, reason: &str) -> FirestoreResult<Transition> {
        let fields = HashMap::from([
            (
                field::STATUS.to_string(),
                JobStatus::Failed.as_str().to_firestore_value(),
            ),
            (field::ERROR.to_string(), reason.to_firestore_value()),
        ]);
        let outcome = self
            .update_while_processing(job_id, "mark_failed", fields, &[field::UPDATED_AT])
            .await?;

        if outcome.applied() {
            info!(job_id = %job_id, reason = %reason, "Job failed");
        }
        Ok(outcome)
    }

    async fn update_while_processing(
        &self,
        job_id: &JobId,
        operation: &str,
        fields: HashMap<String, Value>,
        timestamps: &[&str],
    ) -> FirestoreResult<Transition> {
        let mut last_error = None;

        for attempt in 0..MAX_UPDATE_RETRIES {
            let doc = self
                .store
                .get_document(VIDEO_JOBS_COLLECTION, job_id.as_str())
                .await?
                .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", VIDEO_JOBS_COLLECTION, job_id)))?;

            let status = read_status(&doc)?;
            if status.is_terminal() {
                debug!(job_id = %job_id, status = %status, operation, "Job already terminal, skipping update");
                return Ok(Transition::AlreadyTerminal(status));
            }

            let update_time = doc.update_time.clone().ok_or_else(|| {
                FirestoreError::invalid_response(format!("job {} has no updateTime", job_id))
            })?;

            let name = self.store.document_name(VIDEO_JOBS_COLLECTION, job_id.as_str());
            let write = timestamps.iter().fold(
                Write::merge(name, fields.clone()).with_precondition(Precondition::updated_at(update_time)),
                |write, path| write.with_transform(FieldTransform::request_time(*path)),
            );

            match self.store.commit(vec![write]).await {
                Ok(_) => return Ok(Transition::Transitioned),
                Err(e) if e.is_precondition_failed() => {
                    debug!(
                        job_id = %job_id,
                        attempt = attempt + 1,
                        operation,
                        "Job update precondition failed, retrying"
                    );
                    record_contention(operation);
                    last_error = Some(e);
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            job_id = %job_id,
            retries = MAX_UPDATE_RETRIES,
            error = ?last_error,
            operation,
            "Job update failed after retries"
        );
        Err(last_error.unwrap_or_else(|| {
            FirestoreError::request_failed("Job update failed due to concurrent updates")
        }))
    }
}

fn read_status(doc: &Document) -> FirestoreResult<JobStatus> {
    let raw: String = doc
        .get(field::STATUS)
        .ok_or_else(|| FirestoreError::invalid_response("job document has no status"))?;
    JobStatus::parse(&raw)
        .ok_or_else(|| FirestoreError::invalid_response(format!("unknown job status '{}'", raw)))
}

fn job_from_document(job_id: &JobId, doc: &Document) -> FirestoreResult<VideoJob> {
    let owner_id: String = doc
        .get(field::UID)
        .ok_or_else(|| FirestoreError::invalid_response(format!("job {} has no uid", job_id)))?;

    let request = GenerateVideoRequest {
        attribute: doc.get(field::ATTRIBUTE),
        prompt: doc.get(field::USER_PROMPT),
        duration: doc.get(field::DURATION),
    };

    let mut job = VideoJob::new(
        job_id.clone(),
        owner_id,
        request,
        doc.get(field::STYLE_SEED).unwrap_or(0),
    );
    job.status = read_status(doc)?;
    job.image_url = doc.get(field::IMAGE_URL);
    job.video_url = doc.get(field::VIDEO_URL);
    job.error = doc.get(field::ERROR);
    job.created_at = doc.get(field::CREATED_AT);
    job.updated_at = doc.get(field::UPDATED_AT);
    job.completed_at = doc.get(field::COMPLETED_AT);
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    async fn create_job(store: &Arc<InMemoryStore>, repo: &VideoJobRepository) -> JobId {
        let mut tx = Transaction::new(&**store);
        let request = GenerateVideoRequest::with_attribute("Fire").duration_secs(10);
        let job_id = repo.stage_create(&mut tx, "user-1", &request, 99);
        tx.commit().await.unwrap();
        job_id
    }

    fn setup() -> (Arc<InMemoryStore>, VideoJobRepository) {
        let store = Arc::new(InMemoryStore::new());
        let repo = VideoJobRepository::new(store.clone());
        (store, repo)
    }

    #[tokio::test]
    async fn test_created_job_is_processing_without_results() {
        let (store, repo) = setup();
        let job_id = create_job(&store, &repo).await;

        let job = repo.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.owner_id, "user-1");
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.request.attribute_tag(), Some("Fire"));
        assert_eq!(job.request.duration, Some(10));
        assert_eq!(job.style_seed, 99);
        assert!(job.video_url.is_none());
        assert!(job.error.is_none());
        assert!(job.created_at.is_some());
        assert!(job.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_job() {
        let (_store, repo) = setup();
        assert!(repo.get(&JobId::from_string("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_completed_sets_video_and_timestamp() {
        let (store, repo) = setup();
        let job_id = create_job(&store, &repo).await;

        let outcome = repo.mark_completed(&job_id, "https://cdn/v.mp4").await.unwrap();
        assert_eq!(outcome, Transition::Transitioned);

        let job = repo.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.video_url.as_deref(), Some("https://cdn/v.mp4"));
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_status_is_absorbing() {
        let (store, repo) = setup();
        let job_id = create_job(&store, &repo).await;

        assert!(repo.mark_failed(&job_id, "boom").await.unwrap().applied());
        assert_eq!(
            repo.mark_failed(&job_id, "again").await.unwrap(),
            Transition::AlreadyTerminal(JobStatus::Failed)
        );
        assert_eq!(
            repo.mark_completed(&job_id, "https://cdn/v.mp4").await.unwrap(),
            Transition::AlreadyTerminal(JobStatus::Failed)
        );

        let job = repo.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.video_url.is_none());
    }

    #[tokio::test]
    async fn test_record_image_keeps_processing() {
        let (store, repo) = setup();
        let job_id = create_job(&store, &repo).await;

        repo.record_image(&job_id, "https://cdn/i.png").await.unwrap();
        let job = repo.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.image_url.as_deref(), Some("https://cdn/i.png"));
    }

    #[tokio::test]
    async fn test_mark_on_missing_job_is_not_found() {
        let (_store, repo) = setup();
        let err = repo
            .mark_failed(&JobId::from_string("ghost"), "x")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_terminal_writes_apply_once() {
        let (store, repo) = setup();
        let job_id = create_job(&store, &repo).await;

        let complete = {
            let repo = repo.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move { repo.mark_completed(&job_id, "https://cdn/v.mp4").await })
        };
        let fail = {
            let repo = repo.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move { repo.mark_failed(&job_id, "timeout").await })
        };

        let a = complete.await.unwrap().unwrap();
        let b = fail.await.unwrap().unwrap();
        assert_eq!(
            [a.applied(), b.applied()].iter().filter(|x| **x).count(),
            1
        );
    }
}
