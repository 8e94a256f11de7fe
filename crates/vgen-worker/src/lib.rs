//! Video generation worker.
//!
//! This crate provides:
//! - Job orchestration (validate, debit and create, dispatch)
//! - The job runner (image, then video, then completion or refund)
//! - Prompt building from attribute tags
//! - A bounded background executor with graceful shutdown

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod prompt;
pub mod runner;


pub use config::WorkerConfig;
pub use dispatch::{JobDispatcher, JobQueue, JobTicket, QueueDispatcher};
pub use error::{BeginJobError, JobErrorKind, WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use orchestrator::JobOrchestrator;
pub use prompt::{Attribute, AttributePromptBuilder, PromptBuilder};
pub use runner::{JobOutcome, JobRunner};
