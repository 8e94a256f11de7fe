//! Drives one accepted job through image synthesis, video synthesis and
//! its terminal transition.
//!
//! Every failure is absorbed here: the job is marked failed and, if this
//! call is the one that moved it to `failed`, the owner gets the credit
//! back. Nothing is returned to the caller, who already holds the
//! job id.

use std::sync::Arc;

use tracing::Instrument;
use vgen_firestore::{
    CreditLedger, DocumentStore, RefundOutcome, Transition, VideoJobRepository,
};
use vgen_media_client::MediaGenerator;
use vgen_models::{JobId, JobStatus};

use crate::config::WorkerConfig;
use crate::dispatch::JobTicket;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics::{record_job_completed, record_job_failed, record_refund};
use crate::prompt::PromptBuilder;

/// How a job run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { video_url: String },
    /// `refund` is `None` when the job could not be moved to `failed` by
    /// this run, in which case no credit was returned.
    Failed {
        reason: String,
        refund: Option<RefundOutcome>,
    },
    /// Someone else finished the job first; nothing was written.
    AlreadyTerminal(JobStatus),
}

pub struct JobRunner {
    ledger: CreditLedger,
    jobs: VideoJobRepository,
    media: Arc<dyn MediaGenerator>,
    prompts: Arc<dyn PromptBuilder>,
    config: WorkerConfig,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        media: Arc<dyn MediaGenerator>,
        prompts: Arc<dyn PromptBuilder>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            ledger: CreditLedger::new(store.clone()),
            jobs: VideoJobRepository::new(store),
            media,
            prompts,
            config,
        }
    }

    /// Run a job to a terminal state.
    pub async fn run_job(&self, ticket: JobTicket) -> JobOutcome {
        let logger = JobLogger::new(&ticket, "generate_video");
        let span = logger.create_span();

        async {
            logger.log_start(&ticket.request.display_prompt());

            let result = match self.generate(&ticket, &logger).await {
                Ok(video_url) => self.complete(&ticket, &logger, video_url).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = e.to_string();
                    logger.log_failure(e.kind(), &reason);
                    record_job_failed(e.kind().as_str());
                    let refund = compensate(
                        &self.jobs,
                        &self.ledger,
                        &ticket.job_id,
                        &ticket.owner_id,
                        &reason,
                    )
                    .await;
                    JobOutcome::Failed { reason, refund }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Fail a queued job that will never run, returning its credit.
    pub async fn abandon(&self, ticket: &JobTicket, reason: &str) -> Option<RefundOutcome> {
        JobLogger::new(ticket, "generate_video").log_warning(reason);
        record_job_failed("abandoned");
        compensate(&self.jobs, &self.ledger, &ticket.job_id, &ticket.owner_id, reason).await
    }

    async fn generate(&self, ticket: &JobTicket, logger: &JobLogger) -> WorkerResult<String> {
        let prompts = self.prompts.build(&ticket.request, ticket.style_seed);

        let image_url = self
            .media
            .synthesize_image(
                &prompts.image_prompt,
                self.config.image_width,
                self.config.image_height,
            )
            .await?;
        logger.log_stage("image", &image_url);

        if let Err(e) = self.jobs.record_image(&ticket.job_id, &image_url).await {
            logger.log_warning(&format!("could not record image: {}", e));
        }

        let video_url = self
            .media
            .synthesize_video(
                &image_url,
                &prompts.video_prompt,
                &prompts.negative_prompt,
                ticket.request.video_duration(),
            )
            .await?;
        logger.log_stage("video", &video_url);

        Ok(video_url)
    }

    async fn complete(
        &self,
        ticket: &JobTicket,
        logger: &JobLogger,
        video_url: String,
    ) -> WorkerResult<JobOutcome> {
        match self.jobs.mark_completed(&ticket.job_id, &video_url).await? {
            Transition::Transitioned => {
                record_job_completed();
                logger.log_completion(&video_url);
                Ok(JobOutcome::Completed { video_url })
            }
            Transition::AlreadyTerminal(status) => {
                logger.log_warning(&format!("job already {} before completion", status));
                Ok(JobOutcome::AlreadyTerminal(status))
            }
        }
    }
}

/// Mark the job failed and, only if that transition happened here, refund
/// its owner. The owner is read back from the job record; the caller's copy
/// is used only when the record cannot be read.
pub(crate) async fn compensate(
    jobs: &VideoJobRepository,
    ledger: &CreditLedger,
    job_id: &JobId,
    fallback_owner: &str,
    reason: &str,
) -> Option<RefundOutcome> {
    match jobs.mark_failed(job_id, reason).await {
        Ok(Transition::Transitioned) => {}
        Ok(Transition::AlreadyTerminal(status)) => {
            tracing::info!(job_id = %job_id, status = %status, "Job already terminal, no refund");
            return None;
        }
        Err(e) => {
            // job stays processing with its credit held
            tracing::error!(job_id = %job_id, error = %e, "Could not mark job failed, credit not refunded");
            return None;
        }
    }

    let owner = match jobs.get(job_id).await {
        Ok(Some(job)) => job.owner_id,
        Ok(None) => {
            tracing::warn!(job_id = %job_id, "Job record vanished, refunding ticket owner");
            fallback_owner.to_string()
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Could not read job owner, refunding ticket owner");
            fallback_owner.to_string()
        }
    };

    let outcome = ledger.refund(&owner).await;
    record_refund(match outcome {
        RefundOutcome::Refunded => "refunded",
        RefundOutcome::UserMissing => "user_missing",
        RefundOutcome::Failed => "failed",
    });
    Some(outcome)
}
