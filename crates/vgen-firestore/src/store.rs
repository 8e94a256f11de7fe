//! Document store abstraction.
//!
//! Repositories talk to this trait rather than to the REST client so the
//! same credit and job logic runs against Firestore or the in-memory store.

use async_trait::async_trait;

use crate::error::FirestoreResult;
use crate::types::{CommitResponse, Document, Write};

/// Minimal document database surface: point reads and atomic commits.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Full resource name of `collection/doc_id`, as used in `Write`s.
    fn document_name(&self, collection: &str, doc_id: &str) -> String;

    /// Read a document. `Ok(None)` when it does not exist.
    async fn get_document(&self, collection: &str, doc_id: &str)
        -> FirestoreResult<Option<Document>>;

    /// Apply all writes atomically. If any precondition fails nothing is
    /// written and `FirestoreError::PreconditionFailed` is returned.
    async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse>;

    /// Cheap reachability probe used by readiness checks.
    async fn ping(&self) -> FirestoreResult<()> {
        self.get_document("users", "__readiness_probe__").await.map(|_| ())
    }
}
