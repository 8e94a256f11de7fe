//! Structured job logging.

use tracing::{error, info, warn, Span};

use crate::dispatch::JobTicket;
use crate::error::JobErrorKind;

/// Logs job lifecycle events with the job id, owner and operation attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    user_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(ticket: &JobTicket, operation: &'static str) -> Self {
        Self {
            job_id: ticket.job_id.to_string(),
            user_id: ticket.owner_id.clone(),
            operation,
        }
    }

    pub fn log_start(&self, prompt: &str) {
        info!(
            job_id = %self.job_id,
            user_id = %self.user_id,
            operation = self.operation,
            "Job started: {}", prompt
        );
    }

    /// An upstream stage produced its asset.
    pub fn log_stage(&self, stage: &str, url: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            stage,
            url,
            "Job stage finished"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            user_id = %self.user_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_failure(&self, kind: JobErrorKind, reason: &str) {
        error!(
            job_id = %self.job_id,
            user_id = %self.user_id,
            operation = self.operation,
            kind = kind.as_str(),
            "Job failed: {}", reason
        );
    }

    pub fn log_completion(&self, video_url: &str) {
        info!(
            job_id = %self.job_id,
            user_id = %self.user_id,
            operation = self.operation,
            video_url,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Span that instruments the whole job run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            user_id = %self.user_id,
            operation = self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{GenerateVideoRequest, JobId};

    #[test]
    fn test_logger_carries_ticket_identity() {
        let ticket = JobTicket {
            job_id: JobId::from_string("job-9"),
            owner_id: "user-9".to_string(),
            request: GenerateVideoRequest::with_attribute("Ice"),
            style_seed: 1,
        };
        let logger = JobLogger::new(&ticket, "generate_video");

        assert_eq!(logger.job_id(), "job-9");
        assert_eq!(logger.user_id(), "user-9");
    }
}
