//! Firestore access for the video generation backend.
//!
//! This crate provides:
//! - A Firestore REST client (service-account auth via gcp_auth, token
//!   caching, retries, request metrics)
//! - The `DocumentStore` seam with an in-memory implementation
//! - Optimistic multi-document transactions
//! - The credit ledger and the video job repository

pub mod client;
pub mod credit_ledger;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod transaction;
pub mod types;
pub mod video_jobs_repo;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use credit_ledger::{CreditLedger, DebitError, RefundOutcome, CREDITS_FIELD, USERS_COLLECTION};
pub use error::{FirestoreError, FirestoreResult};
pub use memory::InMemoryStore;
pub use retry::RetryConfig;
pub use store::DocumentStore;
pub use transaction::Transaction;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use video_jobs_repo::{Transition, VideoJobRepository, VIDEO_JOBS_COLLECTION};
