//! Synchronous half of the pipeline: validate, debit one credit and create
//! the job record in a single commit, then hand the job to the dispatcher.

use std::sync::Arc;

use tracing::{debug, info, warn};
use vgen_firestore::metrics::record_contention;
use vgen_firestore::{
    CreditLedger, DebitError, DocumentStore, Transaction, VideoJobRepository,
};
use vgen_models::{GenerateVideoRequest, JobId};

use crate::config::WorkerConfig;
use crate::dispatch::{JobDispatcher, JobTicket};
use crate::error::BeginJobError;
use crate::metrics::{record_job_rejected, record_job_started};
use crate::runner::compensate;

pub struct JobOrchestrator {
    store: Arc<dyn DocumentStore>,
    ledger: CreditLedger,
    jobs: VideoJobRepository,
    dispatcher: Arc<dyn JobDispatcher>,
    config: WorkerConfig,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dispatcher: Arc<dyn JobDispatcher>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            ledger: CreditLedger::new(store.clone()),
            jobs: VideoJobRepository::new(store.clone()),
            store,
            dispatcher,
            config,
        }
    }

    /// Accept a job for `user_id`.
    ///
    /// Returns the new job id once the credit is debited and the job record
    /// exists; media generation continues in the background. Every error
    /// leaves the balance and the job collection as they were.
    pub async fn begin_job(
        &self,
        user_id: &str,
        request: GenerateVideoRequest,
    ) -> Result<JobId, BeginJobError> {
        let result = self.accept(user_id, request).await;
        if let Err(e) = &result {
            record_job_rejected(e.kind().as_str());
        }
        result
    }

    async fn accept(
        &self,
        user_id: &str,
        request: GenerateVideoRequest,
    ) -> Result<JobId, BeginJobError> {
        request.validate_request()?;

        let style_seed: u64 = rand::random();
        let job_id = self.debit_and_create(user_id, &request, style_seed).await?;

        let ticket = JobTicket {
            job_id: job_id.clone(),
            owner_id: user_id.to_string(),
            request,
            style_seed,
        };

        if let Err(e) = self.dispatcher.dispatch(ticket).await {
            warn!(job_id = %job_id, user_id = %user_id, error = %e, "Dispatch failed, rolling back job");
            compensate(&self.jobs, &self.ledger, &job_id, user_id, &e.to_string()).await;
            return Err(BeginJobError::internal(e.to_string()));
        }

        record_job_started();
        info!(job_id = %job_id, user_id = %user_id, "Job accepted");
        Ok(job_id)
    }

    /// Read-check-commit loop. A precondition failure means another writer
    /// touched the user document between our read and commit; the cycle
    /// starts over from a fresh read.
    async fn debit_and_create(
        &self,
        user_id: &str,
        request: &GenerateVideoRequest,
        style_seed: u64,
    ) -> Result<JobId, BeginJobError> {
        let attempts = self.config.tx_max_attempts.max(1);

        for attempt in 0..attempts {
            let mut tx = Transaction::new(&*self.store);

            let remaining = match self.ledger.try_debit(&mut tx, user_id).await {
                Ok(remaining) => remaining,
                Err(DebitError::UserNotFound(id)) => return Err(BeginJobError::UserNotFound(id)),
                Err(DebitError::InsufficientCredits { .. }) => {
                    return Err(BeginJobError::InsufficientCredits)
                }
                Err(DebitError::Store(e)) => {
                    // reads were already retried; the detail only reaches the logs
                    warn!(user_id = %user_id, error = %e, "Failed to read user for debit");
                    return Err(BeginJobError::internal(e.to_string()));
                }
            };

            let job_id = self.jobs.stage_create(&mut tx, user_id, request, style_seed);

            match tx.commit().await {
                Ok(_) => {
                    debug!(job_id = %job_id, user_id = %user_id, remaining, "Debited credit and created job");
                    return Ok(job_id);
                }
                Err(e) if e.is_precondition_failed() => {
                    debug!(
                        user_id = %user_id,
                        attempt = attempt + 1,
                        "Debit transaction contended, retrying"
                    );
                    record_contention("begin_job");
                    tokio::time::sleep(self.config.tx_backoff_base * (attempt + 1)).await;
                }
                Err(e) => {
                    if self.commit_landed(&job_id, user_id).await {
                        warn!(
                            job_id = %job_id,
                            user_id = %user_id,
                            error = %e,
                            "Commit reported an error but was applied"
                        );
                        return Ok(job_id);
                    }
                    warn!(user_id = %user_id, error = %e, "Debit commit failed");
                    return Err(BeginJobError::internal(e.to_string()));
                }
            }
        }

        warn!(user_id = %user_id, attempts, "Debit transaction kept conflicting");
        Err(BeginJobError::internal(
            "Failed to debit credits due to concurrent updates",
        ))
    }

    /// The job id is fixed before the commit is sent, so a commit whose
    /// response was lost can be settled by looking for the job record.
    async fn commit_landed(&self, job_id: &JobId, user_id: &str) -> bool {
        match self.jobs.get(job_id).await {
            Ok(Some(job)) => job.owner_id == user_id,
            Ok(None) => false,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not check whether the commit was applied");
                false
            }
        }
    }
}
