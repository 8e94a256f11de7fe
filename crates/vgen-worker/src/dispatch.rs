//! Handoff of accepted jobs to the background executor.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use vgen_models::{GenerateVideoRequest, JobId};

use crate::error::{WorkerError, WorkerResult};

/// How long `dispatch` waits for room in a full queue.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the runner needs to drive one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: JobId,
    pub owner_id: String,
    pub request: GenerateVideoRequest,
    pub style_seed: u64,
}

/// Hands accepted jobs to whatever runs them.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, ticket: JobTicket) -> WorkerResult<()>;
}

/// Receiving end of the in-process job queue.
pub type JobQueue = mpsc::Receiver<JobTicket>;

/// Dispatcher backed by a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    sender: mpsc::Sender<JobTicket>,
}

impl QueueDispatcher {
    /// Create a dispatcher and the queue it feeds.
    pub fn channel(capacity: usize) -> (Self, JobQueue) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobDispatcher for QueueDispatcher {
    async fn dispatch(&self, ticket: JobTicket) -> WorkerResult<()> {
        match self.sender.send_timeout(ticket, DISPATCH_TIMEOUT).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(WorkerError::dispatch_failed("job queue is full")),
            Err(SendTimeoutError::Closed(_)) => Err(WorkerError::dispatch_failed("job queue is closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket() -> JobTicket {
        JobTicket {
            job_id: JobId::from_string("job-1"),
            owner_id: "user-1".to_string(),
            request: GenerateVideoRequest::with_attribute("Fire"),
            style_seed: 1,
        }
    }

    #[tokio::test]
    async fn test_dispatch_enqueues_ticket() {
        let (dispatcher, mut queue) = QueueDispatcher::channel(4);
        tokio_test::assert_ok!(dispatcher.dispatch(ticket()).await);
        assert_eq!(queue.recv().await, Some(ticket()));
    }

    #[tokio::test]
    async fn test_dispatch_to_closed_queue_fails() {
        let (dispatcher, queue) = QueueDispatcher::channel(4);
        drop(queue);
        let err = tokio_test::assert_err!(dispatcher.dispatch(ticket()).await);
        assert!(matches!(err, WorkerError::DispatchFailed(_)));
    }
}
