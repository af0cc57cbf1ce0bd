//! Store selection from configuration

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::blob::{BlobStore, FirebaseStorageBlobStore, FsBlobStore, MemoryBlobStore};
use crate::config::{BackendKind, Config, FirebaseConfig, ViewConfig};
use crate::document::{
    DocumentStore, FirestoreDocumentStore, JsonlDocumentStore, MemoryDocumentStore,
};
use crate::project::{ProjectRepository, ViewOptions};

/// Directory under the data dir holding local blobs
pub const BLOB_DIR: &str = "blobs";

/// A document store and blob store pair
#[derive(Clone)]
pub struct Backend {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

impl Backend {
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.backend.kind {
            BackendKind::Local => {
                let dir = config.local.resolved_data_dir()?;
                Ok(Self::local(&dir))
            }
            BackendKind::Firebase => Self::firebase(&config.firebase),
        }
    }

    /// JSONL documents and plain-file blobs under `data_dir`
    pub fn local(data_dir: &Path) -> Self {
        debug!(data_dir = %data_dir.display(), "Using local backend");
        Self {
            documents: Arc::new(JsonlDocumentStore::new(data_dir)),
            blobs: Arc::new(FsBlobStore::new(data_dir.join(BLOB_DIR))),
        }
    }

    pub fn memory() -> Self {
        Self {
            documents: Arc::new(MemoryDocumentStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
        }
    }

    /// Firestore and Firebase Storage over REST
    pub fn firebase(config: &FirebaseConfig) -> Result<Self> {
        config.ensure_complete()?;
        let api_key = config.resolved_api_key()?;
        let documents = FirestoreDocumentStore::new(config, api_key.clone())
            .context("Failed to set up the Firestore client")?;
        let blobs = FirebaseStorageBlobStore::new(config, api_key)
            .context("Failed to set up the Firebase Storage client")?;

        debug!(
            project_id = %config.project_id,
            bucket = %config.storage_bucket,
            "Using Firebase backend"
        );
        Ok(Self {
            documents: Arc::new(documents),
            blobs: Arc::new(blobs),
        })
    }

    pub fn into_repository(self, view: &ViewConfig) -> ProjectRepository {
        ProjectRepository::new(self.documents, self.blobs).with_view(ViewOptions {
            search_term: String::new(),
            favorites_only: view.favorites_only,
            sort_by: view.default_sort,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_firebase_requires_project_and_bucket() {
        let err = Backend::firebase(&FirebaseConfig::default()).unwrap_err();
        assert!(err.to_string().contains("project_id"));
    }

    #[test]
    fn test_firebase_refuses_stored_api_key() {
        let config = FirebaseConfig {
            project_id: "demo".to_string(),
            storage_bucket: "demo.appspot.com".to_string(),
            api_key: Some("secret".to_string()),
            ..FirebaseConfig::default()
        };
        assert!(Backend::firebase(&config).is_err());
    }

    #[tokio::test]
    async fn test_local_backend_round_trips_through_repository() {
        let temp_dir = TempDir::new().unwrap();
        let repo = Backend::local(temp_dir.path()).into_repository(&ViewConfig::default());

        let created = repo
            .add_project(crate::project::ProjectData::new("Site", "Acme", "2024-01-01", "2024-02-01"))
            .await
            .unwrap();

        assert!(temp_dir.path().join("projects.jsonl").exists());
        assert_eq!(repo.projects().len(), 1);
        assert_eq!(repo.projects()[0].id, created.id);
    }
}
