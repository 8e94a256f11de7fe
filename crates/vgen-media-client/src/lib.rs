//! Media generation client.
//!
//! Wraps the two upstream model calls the job runner chains together:
//! text-to-image, then image-to-video.

pub mod client;
pub mod error;
pub mod types;

pub use client::{FalClient, MediaClientConfig, MediaGenerator};
pub use error::{MediaError, MediaResult};
pub use types::{ImageRequest, VideoRequest};
