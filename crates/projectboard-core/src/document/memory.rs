//! In-memory document store
//!
//! Keeps collections in a map, records every call it receives, and can be
//! told to fail a given operation. Used by tests and as a scratch backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Document, DocumentStore, Fields, validate_collection};
use crate::error::{Error, Result};

/// Operation kinds of the document store contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentOp {
    List,
    Get,
    Create,
    Update,
    Delete,
}

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCall {
    pub op: DocumentOp,
    pub collection: String,
    pub id: Option<String>,
    pub fields: Option<Fields>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Fields>>,
    calls: Vec<DocumentCall>,
    failing: HashSet<DocumentOp>,
}

/// Document store held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a document under a caller-chosen id, bypassing the call log
    pub fn seed(&self, collection: &str, id: impl Into<String>, fields: Fields) {
        self.lock()
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.into(), fields);
    }

    /// Make every subsequent call of `op` fail until [`recover`](Self::recover)
    pub fn fail(&self, op: DocumentOp) {
        self.lock().failing.insert(op);
    }

    pub fn recover(&self, op: DocumentOp) {
        self.lock().failing.remove(&op);
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<DocumentCall> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of one kind
    pub fn count(&self, op: DocumentOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current fields of a document, bypassing the call log
    pub fn peek(&self, collection: &str, id: &str) -> Option<Fields> {
        self.lock()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Record the call, then fail if the operation is marked failing
    fn enter(
        &self,
        op: DocumentOp,
        collection: &str,
        id: Option<&str>,
        fields: Option<&Fields>,
    ) -> Result<MutexGuard<'_, Inner>> {
        validate_collection(collection)?;
        let mut inner = self.lock();
        inner.calls.push(DocumentCall {
            op,
            collection: collection.to_string(),
            id: id.map(str::to_string),
            fields: fields.cloned(),
        });
        if inner.failing.contains(&op) {
            return Err(Error::DocumentStore(format!(
                "injected {:?} failure on '{}'",
                op, collection
            )));
        }
        Ok(inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let inner = self.enter(DocumentOp::List, collection, None, None)?;
        Ok(inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let inner = self.enter(DocumentOp::Get, collection, Some(id), None)?;
        Ok(inner
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String> {
        let mut inner = self.enter(DocumentOp::Create, collection, None, Some(&fields))?;
        let id = Uuid::new_v4().simple().to_string()[..20].to_string();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let mut inner = self.enter(DocumentOp::Update, collection, Some(id), Some(&fields))?;
        let existing = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| {
                Error::DocumentStore(format!("No document to update: {}/{}", collection, id))
            })?;
        existing.extend(fields);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut inner = self.enter(DocumentOp::Delete, collection, Some(id), None)?;
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }
}
