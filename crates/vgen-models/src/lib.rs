//! Shared data models for the video generation backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video generation jobs and their lifecycle status
//! - Caller request parameters and their validation
//! - Prompt sets produced for the media generator

pub mod job;
pub mod prompt;
pub mod request;

// Re-export common types
pub use job::{JobId, JobStatus, VideoJob};
pub use prompt::PromptSet;
pub use request::{GenerateVideoRequest, RequestError, VideoDuration, MAX_PROMPT_LENGTH};
