//! Projectboard Core Integration Tests

use std::sync::Arc;

use projectboard_core::{
    Error,
    backend::Backend,
    blob::{BlobStore, FsBlobStore, MemoryBlobStore},
    config::ViewConfig,
    document::{DocumentStore, JsonlDocumentStore, MemoryDocumentStore},
    project::{
        COLLECTION, CoverImage, CoverCleanup, ProjectData, ProjectPatch, ProjectRepository,
        SortBy, cover::remove_cover_best_effort,
    },
};
use tempfile::TempDir;

fn local_repository(dir: &TempDir) -> ProjectRepository {
    Backend::local(dir.path()).into_repository(&ViewConfig::default())
}

#[tokio::test]
async fn test_local_project_lifecycle() {
    let dir = TempDir::new().unwrap();
    let repo = local_repository(&dir);

    let created = repo
        .add_project(
            ProjectData::new("Website", "Acme", "2024-01-01", "2024-03-01")
                .with_cover(CoverImage::new("hero.jpg", b"jpeg".to_vec())),
        )
        .await
        .expect("project should be created");
    let cover_url = created.cover_image_url.clone().unwrap();
    assert!(cover_url.starts_with("file://"));
    assert_eq!(repo.projects().len(), 1);

    assert!(repo.toggle_favorite(&created.id).await);
    assert!(
        repo.update_project(&created.id, ProjectPatch::new().client("Acme Corp"))
            .await
    );

    // A fresh repository over the same directory sees the persisted state
    let reopened = local_repository(&dir);
    reopened.fetch_projects().await;
    let projects = reopened.projects();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].client, "Acme Corp");
    assert!(projects[0].is_favorite);
    assert_eq!(projects[0].cover_image_url.as_deref(), Some(cover_url.as_str()));

    assert!(reopened.delete_project(&created.id).await);
    assert!(reopened.projects().is_empty());
    assert_eq!(
        std::fs::read_dir(dir.path().join("blobs/covers")).unwrap().count(),
        0
    );

    repo.fetch_projects().await;
    assert!(repo.projects().is_empty());
}

#[tokio::test]
async fn test_local_cover_replacement() {
    let dir = TempDir::new().unwrap();
    let repo = local_repository(&dir);
    let created = repo
        .add_project(
            ProjectData::new("Branding", "Initech", "2024-02-01", "2024-05-01")
                .with_cover(CoverImage::new("old.png", vec![1, 2, 3])),
        )
        .await
        .unwrap();

    let patch = ProjectPatch::new().cover_file(CoverImage::new("new.png", vec![4, 5, 6]));
    assert!(repo.update_project(&created.id, patch).await);

    let covers: Vec<String> = std::fs::read_dir(dir.path().join("blobs/covers"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(covers.len(), 1);
    assert!(covers[0].ends_with("_new.png"));

    let cached = repo.projects();
    assert!(cached[0].cover_image_url.as_deref().unwrap().ends_with("_new.png"));
}

#[tokio::test]
async fn test_view_over_local_backend() {
    let dir = TempDir::new().unwrap();
    let repo = Backend::local(dir.path()).into_repository(&ViewConfig {
        default_sort: SortBy::EndingSoon,
        favorites_only: false,
    });

    for (name, client, end) in [
        ("Late", "Acme", "2024-12-01"),
        ("Soon", "Globex", "2024-02-01"),
        ("Undated", "Acme", ""),
    ] {
        repo.add_project(ProjectData::new(name, client, "2024-01-01", end))
            .await
            .unwrap();
    }

    let names: Vec<String> = repo
        .filtered_and_sorted_projects()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Soon", "Late", "Undated"]);

    repo.set_search_term("ACME");
    let names: Vec<String> = repo
        .filtered_and_sorted_projects()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Late", "Undated"]);
}

#[tokio::test]
async fn test_corrupt_collection_file_surfaces_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("projects.jsonl"), "{not json}\n").unwrap();
    let repo = local_repository(&dir);

    repo.fetch_projects().await;

    assert!(repo.projects().is_empty());
    let error = repo.error().expect("error slot should be set");
    assert_eq!(error.code(), "E100");
}

#[tokio::test]
async fn test_stores_are_shareable_trait_objects() {
    let dir = TempDir::new().unwrap();
    let documents: Arc<dyn DocumentStore> = Arc::new(JsonlDocumentStore::new(dir.path()));
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path().join("blobs")));
    let repo = Arc::new(ProjectRepository::new(documents.clone(), blobs));

    let mut handles = Vec::new();
    for i in 0..4 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.add_project(ProjectData::new(format!("P{}", i), "Acme", "2024-01-01", "2024-02-01"))
                .await
                .is_some()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    assert_eq!(documents.list(COLLECTION).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_memory_backend_cleanup_outcomes() {
    let blobs = MemoryBlobStore::new();
    let url = blobs.seed("covers/1_a.png", vec![0]);

    assert!(matches!(
        remove_cover_best_effort(&blobs, Some(url.as_str())).await,
        CoverCleanup::Removed
    ));
    assert!(matches!(
        remove_cover_best_effort(&blobs, Some(url.as_str())).await,
        CoverCleanup::Missing
    ));
}

#[tokio::test]
async fn test_memory_backend_fetch_by_id() {
    let documents = Arc::new(MemoryDocumentStore::new());
    let backend = Backend {
        documents: documents.clone(),
        blobs: Arc::new(MemoryBlobStore::new()),
    };
    let repo = backend.into_repository(&ViewConfig::default());

    let created = repo
        .add_project(ProjectData::new("A", "B", "d1", "d2"))
        .await
        .unwrap();

    let fetched = repo.fetch_project_by_id(&created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert!(repo.fetch_project_by_id("missing").await.is_none());
    assert!(repo.error().is_none());

    assert!(!repo.update_project("missing", ProjectPatch::new().name("X")).await);
    assert!(matches!(*repo.error().unwrap(), Error::DocumentStore(_)));
}
