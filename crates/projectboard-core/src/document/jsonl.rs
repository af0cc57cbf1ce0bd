//! JSONL-backed document store for local use
//!
//! Each collection lives in its own file, one document per line:
//!
//! ```text
//! <data_dir>/
//! └── projects.jsonl
//! ```
//!
//! Lines are written sorted by id so the files diff cleanly under git.
//! Every mutation rewrites the collection file through a temporary file and
//! a rename; an async mutex serializes read-modify-write cycles within one
//! process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{Document, DocumentStore, Fields, validate_collection};
use crate::error::{Error, Result};

/// One line of a collection file
#[derive(Debug, Serialize, Deserialize)]
struct DocumentRecord {
    id: String,
    fields: Fields,
}

/// Document store persisted as JSON Lines files in a directory
#[derive(Debug)]
pub struct JsonlDocumentStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlDocumentStore {
    /// Open a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", collection))
    }

    async fn read_collection(&self, collection: &str) -> Result<BTreeMap<String, Fields>> {
        validate_collection(collection)?;
        let path = self.collection_path(collection);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut docs = BTreeMap::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: DocumentRecord = serde_json::from_str(line).map_err(|e| {
                Error::DocumentStore(format!(
                    "{}:{}: invalid JSON: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            docs.insert(record.id, record.fields);
        }
        Ok(docs)
    }

    async fn write_collection(
        &self,
        collection: &str,
        docs: BTreeMap<String, Fields>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut buf = String::new();
        for (id, fields) in docs {
            let line = serde_json::to_string(&DocumentRecord { id, fields })?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let path = self.collection_path(collection);
        let tmp = path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, buf).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonlDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let docs = self.read_collection(collection).await?;
        Ok(docs
            .into_iter()
            .map(|(id, fields)| Document::new(id, fields))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut docs = self.read_collection(collection).await?;
        Ok(docs.remove(id).map(|fields| Document::new(id, fields)))
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read_collection(collection).await?;

        let id = Uuid::new_v4().simple().to_string()[..20].to_string();
        docs.insert(id.clone(), fields);
        self.write_collection(collection, docs).await?;

        debug!(collection = %collection, document_id = %id, "Document created");
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read_collection(collection).await?;

        let existing = docs.get_mut(id).ok_or_else(|| {
            Error::DocumentStore(format!("No document to update: {}/{}", collection, id))
        })?;
        existing.extend(fields);
        self.write_collection(collection, docs).await?;

        debug!(collection = %collection, document_id = %id, "Document updated");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read_collection(collection).await?;

        if docs.remove(id).is_some() {
            self.write_collection(collection, docs).await?;
            debug!(collection = %collection, document_id = %id, "Document deleted");
        }
        Ok(())
    }
}
