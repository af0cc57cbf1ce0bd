//! Document store contract
//!
//! A document store keeps schema-less field bags ("documents") keyed by
//! store-assigned identifiers and grouped into named collections. The
//! repository only ever talks to a store through [`DocumentStore`], so the
//! backing service is swappable:
//!
//! - [`MemoryDocumentStore`]: in-process, records calls, injectable failures
//! - [`JsonlDocumentStore`]: one `.jsonl` file per collection on local disk
//! - [`FirestoreDocumentStore`]: Cloud Firestore over its REST API

pub mod firestore;
pub mod jsonl;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use firestore::FirestoreDocumentStore;
pub use jsonl::JsonlDocumentStore;
pub use memory::{DocumentCall, DocumentOp, MemoryDocumentStore};

/// Field bag of a document, keyed by field name
pub type Fields = BTreeMap<String, FieldValue>;

/// A typed field value as held by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Name of the variant, used in decode error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// A document read back from a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier
    pub id: String,
    /// Document fields
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Remote collection-of-documents service
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List every document in a collection
    async fn list(&self, collection: &str) -> Result<Vec<Document>>;

    /// Read one document; `Ok(None)` when it does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create a document and return the identifier the store assigned
    async fn create(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Overwrite the named fields of an existing document, leaving the rest
    ///
    /// Fails if the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Delete a document; deleting a missing document succeeds
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}

/// Reject collection names that cannot be used as a single path segment
pub(crate) fn validate_collection(collection: &str) -> Result<()> {
    if collection.is_empty()
        || collection.contains(['/', '\\'])
        || collection == "."
        || collection == ".."
    {
        return Err(crate::Error::InvalidInput(format!(
            "Invalid collection name: '{}'",
            collection
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn DocumentStore) {}

    #[test]
    fn test_field_value_serde_shape() {
        let value = FieldValue::String("Acme".to_string());
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"type": "string", "value": "Acme"}));

        let null: FieldValue = serde_json::from_value(serde_json::json!({"type": "null"})).unwrap();
        assert!(null.is_null());
    }

    #[test]
    fn test_field_value_accessors() {
        assert_eq!(FieldValue::from("x").as_str(), Some("x"));
        assert_eq!(FieldValue::from(true).as_bool(), Some(true));
        assert_eq!(FieldValue::Integer(3).as_str(), None);
        assert_eq!(FieldValue::Double(1.5).kind(), "double");
    }

    #[test]
    fn test_validate_collection() {
        assert!(validate_collection("projects").is_ok());
        assert!(validate_collection("").is_err());
        assert!(validate_collection("../etc").is_err());
        assert!(validate_collection("..").is_err());
    }
}
