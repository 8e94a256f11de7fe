//! Background job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::dispatch::JobQueue;
use crate::error::{WorkerError, WorkerResult};
use crate::runner::JobRunner;

/// Consumes dispatched jobs and runs them with bounded concurrency.
pub struct JobExecutor {
    config: WorkerConfig,
    runner: Arc<JobRunner>,
    queue: Mutex<JobQueue>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, runner: Arc<JobRunner>, queue: JobQueue) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            runner,
            queue: Mutex::new(queue),
            job_semaphore,
            shutdown,
        }
    }

    /// Run until shutdown is signalled or every dispatcher is gone.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor with {} max concurrent jobs",
            self.config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut queue = self.queue.lock().await;

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown already requested, stopping executor");
                break;
            }

            let permit = tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                    continue;
                }
                permit = self.job_semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| WorkerError::dispatch_failed("Semaphore closed"))?
                }
            };

            let ticket = tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                    continue;
                }
                ticket = queue.recv() => match ticket {
                    Some(ticket) => ticket,
                    None => {
                        info!("Job queue closed, stopping executor");
                        break;
                    }
                },
            };

            let runner = Arc::clone(&self.runner);
            tokio::spawn(async move {
                let _permit = permit;
                runner.run_job(ticket).await;
            });
        }

        // refuse new work, then fail whatever is still queued so the
        // owners get their credits back
        queue.close();
        while let Ok(ticket) = queue.try_recv() {
            self.runner
                .abandon(&ticket, "Service shut down before the job started")
                .await;
        }

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                "In-flight jobs still running after {:?}",
                self.config.shutdown_timeout
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown. Sticks even when `run` has not subscribed yet.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Jobs currently running.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent_jobs - self.job_semaphore.available_permits()
    }
}
