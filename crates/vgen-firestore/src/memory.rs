//! In-process document store.
//!
//! Implements the same precondition and transform semantics as the
//! Firestore commit endpoint, so credit and job logic can run without a
//! database. Update times are strictly increasing per store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tokio::sync::Mutex;

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::DocumentStore;
use crate::types::{
    CommitResponse, Document, FieldTransform, Precondition, ServerValue, Value, Write, WriteResult,
};

const ROOT: &str = "projects/local/databases/(default)/documents";

#[derive(Debug, Clone)]
struct StoredDocument {
    fields: HashMap<String, Value>,
    create_time: String,
    update_time: String,
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<String, StoredDocument>,
    clock: Option<DateTime<Utc>>,
    commits: u64,
}

impl State {
    fn tick(&mut self) -> String {
        let now = Utc::now();
        let next = match self.clock {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Document store held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document outside of any commit.
    pub async fn put(&self, collection: &str, doc_id: &str, fields: HashMap<String, Value>) {
        let name = self.document_name(collection, doc_id);
        let mut state = self.state.lock().await;
        let now = state.tick();
        let create_time = state
            .documents
            .get(&name)
            .map(|d| d.create_time.clone())
            .unwrap_or_else(|| now.clone());
        state.documents.insert(
            name,
            StoredDocument {
                fields,
                create_time,
                update_time: now,
            },
        );
    }

    /// Number of successful commits applied so far.
    pub async fn commit_count(&self) -> u64 {
        self.state.lock().await.commits
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        let prefix = format!("{}/{}/", ROOT, collection);
        self.state
            .lock()
            .await
            .documents
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .count()
    }
}

fn check_precondition(
    name: &str,
    current: Option<&StoredDocument>,
    precondition: &Precondition,
) -> FirestoreResult<()> {
    if let Some(exists) = precondition.exists {
        if exists != current.is_some() {
            return Err(FirestoreError::PreconditionFailed(format!(
                "{}: expected exists={}",
                name, exists
            )));
        }
    }

    if let Some(expected) = &precondition.update_time {
        match current {
            Some(doc) if &doc.update_time == expected => {}
            _ => {
                return Err(FirestoreError::PreconditionFailed(format!(
                    "{}: document changed since {}",
                    name, expected
                )))
            }
        }
    }

    Ok(())
}

fn apply_transform(fields: &mut HashMap<String, Value>, transform: &FieldTransform, commit_time: &str) {
    if let Some(Value::IntegerValue(by)) = &transform.increment {
        let by: i64 = by.parse().unwrap_or(0);
        // a double stays a double; anything non-numeric starts from zero
        let incremented = match fields.get(&transform.field_path) {
            Some(Value::DoubleValue(v)) => Value::DoubleValue(v + by as f64),
            Some(Value::IntegerValue(v)) => {
                Value::IntegerValue(v.parse::<i64>().unwrap_or(0).saturating_add(by).to_string())
            }
            _ => Value::IntegerValue(by.to_string()),
        };
        fields.insert(transform.field_path.clone(), incremented);
    }

    if let Some(ServerValue::RequestTime) = transform.set_to_server_value {
        fields.insert(
            transform.field_path.clone(),
            Value::TimestampValue(commit_time.to_string()),
        );
    }
}

fn apply_write(
    documents: &mut HashMap<String, StoredDocument>,
    write: &Write,
    commit_time: &str,
) -> FirestoreResult<()> {
    let name = write
        .target()
        .ok_or_else(|| FirestoreError::request_failed("write without a target document"))?
        .to_string();

    if let Some(precondition) = &write.current_document {
        check_precondition(&name, documents.get(&name), precondition)?;
    }

    if write.delete.is_some() {
        documents.remove(&name);
        return Ok(());
    }

    let incoming = write
        .update
        .as_ref()
        .and_then(|d| d.fields.clone())
        .unwrap_or_default();

    let existing = documents.get(&name);
    let create_time = existing
        .map(|d| d.create_time.clone())
        .unwrap_or_else(|| commit_time.to_string());

    let mut fields = match &write.update_mask {
        Some(mask) => {
            let mut fields = existing.map(|d| d.fields.clone()).unwrap_or_default();
            for path in &mask.field_paths {
                match incoming.get(path) {
                    Some(value) => fields.insert(path.clone(), value.clone()),
                    None => fields.remove(path),
                };
            }
            fields
        }
        None => incoming,
    };

    for transform in &write.update_transforms {
        apply_transform(&mut fields, transform, commit_time);
    }

    documents.insert(
        name,
        StoredDocument {
            fields,
            create_time,
            update_time: commit_time.to_string(),
        },
    );
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn document_name(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", ROOT, collection, doc_id)
    }

    async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let name = self.document_name(collection, doc_id);
        let state = self.state.lock().await;
        Ok(state.documents.get(&name).map(|doc| Document {
            name: Some(name.clone()),
            fields: Some(doc.fields.clone()),
            create_time: Some(doc.create_time.clone()),
            update_time: Some(doc.update_time.clone()),
        }))
    }

    async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse> {
        let mut state = self.state.lock().await;
        let commit_time = state.tick();

        // stage on a copy so a failed precondition leaves nothing behind
        let mut staged = state.documents.clone();
        for write in &writes {
            apply_write(&mut staged, write, &commit_time)?;
        }

        state.documents = staged;
        state.commits += 1;

        Ok(CommitResponse {
            write_results: writes
                .iter()
                .map(|_| WriteResult {
                    update_time: Some(commit_time.clone()),
                })
                .collect(),
            commit_time: Some(commit_time),
        })
    }
}
