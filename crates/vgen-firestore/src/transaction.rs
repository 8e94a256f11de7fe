//! Optimistic read-modify-write transactions.
//!
//! A `Transaction` remembers the version of every document it read and
//! stages writes. On commit each staged write to a previously read document
//! is guarded by that version (its `updateTime`, or `exists=false` if it was
//! missing), so the whole commit fails with `PreconditionFailed` when any of
//! those documents changed in between. Callers re-run the full cycle.

use std::collections::HashMap;

use crate::error::FirestoreResult;
use crate::store::DocumentStore;
use crate::types::{CommitResponse, Document, Precondition, Write};

pub struct Transaction<'a> {
    store: &'a dyn DocumentStore,
    read_versions: HashMap<String, Option<String>>,
    writes: Vec<Write>,
}

impl<'a> Transaction<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            read_versions: HashMap::new(),
            writes: Vec::new(),
        }
    }

    pub fn document_name(&self, collection: &str, doc_id: &str) -> String {
        self.store.document_name(collection, doc_id)
    }

    /// Read a document and record its version.
    pub async fn get(&mut self, collection: &str, doc_id: &str) -> FirestoreResult<Option<Document>> {
        let doc = self.store.get_document(collection, doc_id).await?;
        let name = self.document_name(collection, doc_id);
        let version = doc.as_ref().and_then(|d| d.update_time.clone());
        self.read_versions.entry(name).or_insert(version);
        Ok(doc)
    }

    /// Stage a write. Writes that already carry a precondition keep it.
    pub fn stage(&mut self, write: Write) {
        self.writes.push(write);
    }

    pub fn staged_writes(&self) -> &[Write] {
        &self.writes
    }

    /// Commit all staged writes atomically.
    pub async fn commit(self) -> FirestoreResult<CommitResponse> {
        let Transaction {
            store,
            read_versions,
            writes,
        } = self;

        let guarded = writes
            .into_iter()
            .map(|write| {
                if write.current_document.is_some() {
                    return write;
                }
                match write.target().and_then(|name| read_versions.get(name)) {
                    Some(Some(update_time)) => {
                        let update_time = update_time.clone();
                        write.with_precondition(Precondition::updated_at(update_time))
                    }
                    Some(None) => write.with_precondition(Precondition::exists(false)),
                    None => write,
                }
            })
            .collect();

        store.commit(guarded).await
    }
}
