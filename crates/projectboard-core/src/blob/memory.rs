//! In-memory blob store with a call log and injectable failures

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BlobHandle, BlobStore, validate_blob_path};
use crate::error::{Error, Result};

/// URL scheme prefix of blobs held by [`MemoryBlobStore`]
pub const MEMORY_URL_PREFIX: &str = "memory://blobs/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobOp {
    Put,
    Url,
    Delete,
}

/// One recorded call; `target` is the path, handle path, or delete argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobCall {
    pub op: BlobOp,
    pub target: String,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    content_type: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: HashMap<String, StoredBlob>,
    calls: Vec<BlobCall>,
    failing: HashSet<BlobOp>,
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    inner: Mutex<Inner>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place a blob directly, bypassing the call log; returns its URL
    pub fn seed(&self, path: &str, data: Vec<u8>) -> String {
        self.lock().blobs.insert(
            path.to_string(),
            StoredBlob {
                data,
                content_type: None,
            },
        );
        format!("{}{}", MEMORY_URL_PREFIX, path)
    }

    pub fn fail(&self, op: BlobOp) {
        self.lock().failing.insert(op);
    }

    pub fn recover(&self, op: BlobOp) {
        self.lock().failing.remove(&op);
    }

    pub fn calls(&self) -> Vec<BlobCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, op: BlobOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lock().blobs.contains_key(path)
    }

    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(path).map(|b| b.data.clone())
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.lock()
            .blobs
            .get(path)
            .and_then(|b| b.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn enter(&self, op: BlobOp, target: &str) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(BlobCall {
            op,
            target: target.to_string(),
        });
        if inner.failing.contains(&op) {
            return Err(Error::BlobStore(format!(
                "injected {:?} failure on '{}'",
                op, target
            )));
        }
        Ok(inner)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<BlobHandle> {
        let mut inner = self.enter(BlobOp::Put, path)?;
        validate_blob_path(path)?;
        inner.blobs.insert(
            path.to_string(),
            StoredBlob {
                data,
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(BlobHandle::new(path))
    }

    async fn url(&self, handle: &BlobHandle) -> Result<String> {
        let inner = self.enter(BlobOp::Url, &handle.path)?;
        if !inner.blobs.contains_key(&handle.path) {
            return Err(Error::BlobNotFound(handle.path.clone()));
        }
        Ok(format!("{}{}", MEMORY_URL_PREFIX, handle.path))
    }

    async fn delete(&self, url_or_path: &str) -> Result<()> {
        let mut inner = self.enter(BlobOp::Delete, url_or_path)?;
        let path = url_or_path
            .strip_prefix(MEMORY_URL_PREFIX)
            .unwrap_or(url_or_path);
        match inner.blobs.remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::BlobNotFound(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_url_delete_by_url() {
        let store = MemoryBlobStore::new();
        let handle = store
            .put("covers/1_a.png", vec![1, 2, 3], Some("image/png"))
            .await
            .unwrap();
        let url = store.url(&handle).await.unwrap();
        assert_eq!(url, "memory://blobs/covers/1_a.png");
        assert_eq!(store.content_type("covers/1_a.png").as_deref(), Some("image/png"));

        store.delete(&url).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = store.delete("covers/missing.png").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_delete_failure_is_not_not_found() {
        let store = MemoryBlobStore::new();
        store.seed("covers/x.png", vec![0]);
        store.fail(BlobOp::Delete);

        let err = store.delete("covers/x.png").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(store.contains("covers/x.png"));
        assert_eq!(store.count(BlobOp::Delete), 1);
    }
}
