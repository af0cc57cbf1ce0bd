//! Local filesystem blob store
//!
//! Blobs are plain files under a root directory. URLs are `file://` URLs of
//! the canonical file location, so they can be opened directly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use super::{BlobHandle, BlobStore, validate_blob_path};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn canonical_root(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(tokio::fs::canonicalize(&self.root).await?)
    }

    /// Turn a delete argument into a path relative to the root
    async fn relative_path(&self, url_or_path: &str) -> Result<PathBuf> {
        if !url_or_path.starts_with("file://") {
            validate_blob_path(url_or_path)?;
            return Ok(PathBuf::from(url_or_path));
        }

        let url = Url::parse(url_or_path)
            .map_err(|e| Error::InvalidInput(format!("Invalid blob URL '{}': {}", url_or_path, e)))?;
        let file = url
            .to_file_path()
            .map_err(|_| Error::InvalidInput(format!("Not a local file URL: {}", url_or_path)))?;
        let root = self.canonical_root().await?;
        let relative = file.strip_prefix(&root).map_err(|_| {
            Error::InvalidInput(format!(
                "Blob URL points outside the store root: {}",
                url_or_path
            ))
        })?;
        Ok(relative.to_path_buf())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        path: &str,
        data: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<BlobHandle> {
        validate_blob_path(path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = data.len();
        tokio::fs::write(&target, data).await?;

        debug!(path = %path, bytes = size, "Blob written");
        Ok(BlobHandle::new(path))
    }

    async fn url(&self, handle: &BlobHandle) -> Result<String> {
        validate_blob_path(&handle.path)?;
        let file = self.canonical_root().await?.join(&handle.path);
        if !tokio::fs::try_exists(&file).await? {
            return Err(Error::BlobNotFound(handle.path.clone()));
        }
        let url = Url::from_file_path(&file)
            .map_err(|_| Error::BlobStore(format!("Cannot build URL for {}", file.display())))?;
        Ok(url.to_string())
    }

    async fn delete(&self, url_or_path: &str) -> Result<()> {
        let relative = self.relative_path(url_or_path).await?;
        match tokio::fs::remove_file(self.root.join(&relative)).await {
            Ok(()) => {
                debug!(path = %relative.display(), "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::BlobNotFound(relative.display().to_string()))
            }
            Err(e) => Err(Error::BlobStore(format!(
                "Failed to delete {}: {}",
                relative.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_writes_file_and_url_is_file_url() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().join("blobs"));

        let handle = store
            .put("covers/1_logo.png", b"png".to_vec(), Some("image/png"))
            .await
            .unwrap();
        let url = store.url(&handle).await.unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("covers/1_logo.png"));
        let written = std::fs::read(temp_dir.path().join("blobs/covers/1_logo.png")).unwrap();
        assert_eq!(written, b"png");
    }

    #[tokio::test]
    async fn test_delete_by_url_and_by_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        let a = store.put("covers/a.png", vec![1], None).await.unwrap();
        let url = store.url(&a).await.unwrap();
        store.delete(&url).await.unwrap();
        assert!(!temp_dir.path().join("covers/a.png").exists());

        store.put("covers/b.png", vec![2], None).await.unwrap();
        store.delete("covers/b.png").await.unwrap();
        assert!(!temp_dir.path().join("covers/b.png").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path());

        let err = store.delete("covers/ghost.png").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_url_outside_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp_dir.path().join("blobs"));

        let outside = Url::from_file_path(temp_dir.path().join("other.png")).unwrap();
        let err = store.delete(outside.as_str()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
