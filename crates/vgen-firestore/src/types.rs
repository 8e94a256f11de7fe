//! Firestore REST API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    /// Create time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    /// Update time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            fields: Some(fields),
            ..Default::default()
        }
    }

    /// Create a named document, as required inside a `Write`.
    pub fn named(name: impl Into<String>, fields: HashMap<String, Value>) -> Self {
        Self {
            name: Some(name.into()),
            fields: Some(fields),
            ..Default::default()
        }
    }

    /// Typed field accessor.
    pub fn get<T: FromFirestoreValue>(&self, field: &str) -> Option<T> {
        self.fields
            .as_ref()
            .and_then(|f| f.get(field))
            .and_then(T::from_firestore_value)
    }

    /// Whether the field is present (null counts as present).
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.as_ref().is_some_and(|f| f.contains_key(field))
    }
}

// ============================================================================
// Commit Types (atomic multi-document writes)
// ============================================================================

/// A single write operation in a commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    /// Update or insert a document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Document>,

    /// Delete a document by name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,

    /// Field mask for partial updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,

    /// Server-side transforms applied after `update`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_transforms: Vec<FieldTransform>,

    /// Precondition for the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Precondition>,
}

impl Write {
    /// Merge `fields` into the named document (only the listed paths change).
    pub fn merge(name: impl Into<String>, fields: HashMap<String, Value>) -> Self {
        let mut paths: Vec<String> = fields.keys().cloned().collect();
        paths.sort();
        Self {
            update: Some(Document::named(name, fields)),
            update_mask: Some(DocumentMask { field_paths: paths }),
            ..Default::default()
        }
    }

    /// Create the named document; fails if it already exists.
    pub fn create(name: impl Into<String>, fields: HashMap<String, Value>) -> Self {
        Self {
            update: Some(Document::named(name, fields)),
            current_document: Some(Precondition::exists(false)),
            ..Default::default()
        }
    }

    /// Delete the named document. Deleting a missing document succeeds.
    pub fn delete(name: impl Into<String>) -> Self {
        Self {
            delete: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.current_document = Some(precondition);
        self
    }

    pub fn with_transform(mut self, transform: FieldTransform) -> Self {
        self.update_transforms.push(transform);
        self
    }

    /// Document name targeted by this write.
    pub fn target(&self) -> Option<&str> {
        self.update
            .as_ref()
            .and_then(|d| d.name.as_deref())
            .or(self.delete.as_deref())
    }
}

/// Document field mask for partial updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    pub field_paths: Vec<String>,
}

/// Precondition for a write operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Precondition {
    /// Document must exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,

    /// Document must have this update time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Precondition {
    pub fn exists(exists: bool) -> Self {
        Self {
            exists: Some(exists),
            update_time: None,
        }
    }

    pub fn updated_at(update_time: impl Into<String>) -> Self {
        Self {
            exists: None,
            update_time: Some(update_time.into()),
        }
    }
}

/// Server value for `setToServerValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerValue {
    RequestTime,
}

/// Server-side field transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_to_server_value: Option<ServerValue>,
}

impl FieldTransform {
    /// Atomically add `by` to an integer field (missing fields start at 0).
    pub fn increment(field_path: impl Into<String>, by: i64) -> Self {
        Self {
            field_path: field_path.into(),
            increment: Some(by.to_firestore_value()),
            set_to_server_value: None,
        }
    }

    /// Set the field to the commit time.
    pub fn request_time(field_path: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            increment: None,
            set_to_server_value: Some(ServerValue::RequestTime),
        }
    }
}

/// Commit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

/// Result of a single write in a commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    /// Update time of the written document.
    pub update_time: Option<String>,
}

/// Commit response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    /// Results for each write, in order.
    #[serde(default)]
    pub write_results: Vec<WriteResult>,
    /// Time at which the commit was applied.
    pub commit_time: Option<String>,
}

/// Convert a Rust value to Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToFirestoreValue for u64 {
    // Firestore integers are signed 64-bit; the bit pattern is preserved.
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue((*self as i64).to_string())
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

/// Convert Firestore Value to Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        i64::from_firestore_value(value).and_then(|v| u32::try_from(v).ok())
    }
}

impl FromFirestoreValue for u64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse::<i64>().ok().map(|v| v as u64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_values_are_strings_on_the_wire() {
        let json = serde_json::to_value(42i64.to_firestore_value()).unwrap();
        assert_eq!(json, serde_json::json!({ "integerValue": "42" }));
    }

    #[test]
    fn test_u64_seed_survives_signed_storage() {
        let seed = u64::MAX - 3;
        let value = seed.to_firestore_value();
        assert_eq!(u64::from_firestore_value(&value), Some(seed));
    }

    #[test]
    fn test_negative_integer_is_not_u32() {
        let value = (-1i64).to_firestore_value();
        assert_eq!(u32::from_firestore_value(&value), None);
        assert_eq!(i64::from_firestore_value(&value), Some(-1));
    }

    #[test]
    fn test_create_write_serialization() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), "processing".to_firestore_value());
        let write = Write::create("projects/p/databases/(default)/documents/videoJobs/j1", fields)
            .with_transform(FieldTransform::request_time("createdAt"));

        let json = serde_json::to_value(&write).unwrap();
        assert_eq!(json["currentDocument"]["exists"], false);
        assert_eq!(json["updateTransforms"][0]["fieldPath"], "createdAt");
        assert_eq!(json["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
        assert!(json.get("updateMask").is_none());
    }

    #[test]
    fn test_increment_transform_serialization() {
        let json = serde_json::to_value(FieldTransform::increment("credits", 1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "fieldPath": "credits", "increment": { "integerValue": "1" } })
        );
    }

    #[test]
    fn test_document_typed_get() {
        let mut fields = HashMap::new();
        fields.insert("credits".to_string(), 3i64.to_firestore_value());
        let doc = Document::new(fields);
        assert_eq!(doc.get::<i64>("credits"), Some(3));
        assert_eq!(doc.get::<String>("credits"), None);
        assert!(doc.has_field("credits"));
        assert!(!doc.has_field("missing"));
    }
}
