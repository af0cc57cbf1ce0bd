//! Project repository
//!
//! Mirrors the `projects` collection into an in-memory list and mediates every
//! write against the document and blob stores. Operations never return an
//! error: failures land in the shared error slot and the operation reports a
//! `None`/`false` sentinel. State is published through a watch channel so any
//! number of observers can follow `loading`, `error` and the list.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::cover::{remove_cover_best_effort, upload_cover};
use super::entity::{COLLECTION, Project, ProjectData, ProjectPatch, field};
use super::state::ProjectState;
use super::view::{SortBy, ViewOptions};
use crate::blob::BlobStore;
use crate::document::{DocumentStore, FieldValue, Fields};
use crate::error::{Error, Result};

pub struct ProjectRepository {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    state: watch::Sender<ProjectState>,
}

impl std::fmt::Debug for ProjectRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ProjectRepository")
            .field("projects", &state.projects.len())
            .field("loading", &state.loading)
            .field("error", &state.error)
            .finish()
    }
}

impl ProjectRepository {
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            documents,
            blobs,
            state: watch::Sender::new(ProjectState::default()),
        }
    }

    /// Start from the given view settings instead of the defaults
    pub fn with_view(self, options: ViewOptions) -> Self {
        self.state.send_modify(|s| {
            s.search_term = options.search_term.to_lowercase();
            s.show_favorites_only = options.favorites_only;
            s.sort_by = options.sort_by;
        });
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ProjectState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ProjectState {
        self.state.borrow().clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.state.borrow().projects.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<Arc<Error>> {
        self.state.borrow().error.clone()
    }

    pub fn search_term(&self) -> String {
        self.state.borrow().search_term.clone()
    }

    pub fn show_favorites_only(&self) -> bool {
        self.state.borrow().show_favorites_only
    }

    pub fn sort_by(&self) -> SortBy {
        self.state.borrow().sort_by
    }

    /// The cached list after search, favorites filter and sort
    pub fn filtered_and_sorted_projects(&self) -> Vec<Project> {
        self.state.borrow().filtered_and_sorted()
    }

    pub fn set_search_term(&self, term: impl AsRef<str>) {
        let term = term.as_ref().to_lowercase();
        self.state.send_if_modified(|s| {
            if s.search_term == term {
                return false;
            }
            s.search_term = term;
            true
        });
    }

    pub fn set_show_favorites_only(&self, favorites_only: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.show_favorites_only != favorites_only;
            s.show_favorites_only = favorites_only;
            changed
        });
    }

    pub fn set_sort_by(&self, sort_by: SortBy) {
        self.state.send_if_modified(|s| {
            let changed = s.sort_by != sort_by;
            s.sort_by = sort_by;
            changed
        });
    }

    /// Replace the cached list with the remote collection
    ///
    /// On failure the list is emptied and the error slot set.
    pub async fn fetch_projects(&self) {
        self.begin();
        match self.load_all().await {
            Ok(projects) => {
                debug!(count = projects.len(), "Fetched projects");
                self.state.send_modify(|s| {
                    s.projects = projects;
                    s.loading = false;
                });
            }
            Err(e) => {
                self.state.send_modify(|s| s.projects.clear());
                self.fail("fetch_projects", e);
            }
        }
    }

    /// Read one project from the store; the cache is left alone
    ///
    /// A missing document is `None` without touching the error slot.
    pub async fn fetch_project_by_id(&self, id: &str) -> Option<Project> {
        self.begin();
        match self.load_one(id).await {
            Ok(project) => {
                if project.is_none() {
                    debug!(project_id = %id, "Project not found");
                }
                self.finish();
                project
            }
            Err(e) => {
                self.fail("fetch_project_by_id", e);
                None
            }
        }
    }

    /// Create a project, uploading its cover first when one is given
    ///
    /// The cached list is refreshed before returning. A failed refresh empties
    /// the list and sets the error slot but still yields the created project.
    pub async fn add_project(&self, data: ProjectData) -> Option<Project> {
        self.begin();
        let project = match self.create(data).await {
            Ok(project) => project,
            Err(e) => {
                self.fail("add_project", e);
                return None;
            }
        };
        info!(project_id = %project.id, name = %project.name, "Created project");

        match self.load_all().await {
            Ok(projects) => self.state.send_modify(|s| s.projects = projects),
            Err(e) => {
                warn!(error = %e, "Failed to refresh projects after create");
                self.state.send_modify(|s| {
                    s.projects.clear();
                    s.error = Some(Arc::new(e));
                });
            }
        }
        self.finish();
        Some(project)
    }

    /// Apply a partial update; an empty patch succeeds without any I/O
    pub async fn update_project(&self, id: &str, patch: ProjectPatch) -> bool {
        self.begin();
        if patch.is_empty() {
            self.finish();
            return true;
        }
        match self.patch(id, patch).await {
            Ok(()) => {
                info!(project_id = %id, "Updated project");
                self.finish();
                true
            }
            Err(e) => {
                self.fail("update_project", e);
                false
            }
        }
    }

    /// Delete a project and, best-effort, its cover image
    pub async fn delete_project(&self, id: &str) -> bool {
        self.begin();
        match self.remove(id).await {
            Ok(()) => {
                info!(project_id = %id, "Deleted project");
                self.finish();
                true
            }
            Err(e) => {
                self.fail("delete_project", e);
                false
            }
        }
    }

    /// Flip `isFavorite` on a cached project
    ///
    /// Uncached ids fail fast without a remote write.
    pub async fn toggle_favorite(&self, id: &str) -> bool {
        let current = self.state.borrow().find(id).map(|p| p.is_favorite);
        let Some(current) = current else {
            warn!(project_id = %id, "Cannot toggle favorite on a project that is not loaded");
            return false;
        };

        self.begin();
        let next = !current;
        let mut fields = Fields::new();
        fields.insert(field::IS_FAVORITE.to_string(), FieldValue::from(next));

        match self.documents.update(COLLECTION, id, fields).await {
            Ok(()) => {
                debug!(project_id = %id, is_favorite = next, "Toggled favorite");
                self.state.send_modify(|s| {
                    if let Some(project) = s.find_mut(id) {
                        project.is_favorite = next;
                    }
                    s.loading = false;
                });
                true
            }
            Err(e) => {
                self.fail("toggle_favorite", e);
                false
            }
        }
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish(&self) {
        self.state.send_modify(|s| s.loading = false);
    }

    fn fail(&self, operation: &'static str, error: Error) {
        warn!(operation, code = error.code(), error = %error, "Project operation failed");
        self.state.send_modify(|s| {
            s.loading = false;
            s.error = Some(Arc::new(error));
        });
    }

    fn is_cached(&self, id: &str) -> bool {
        self.state.borrow().find(id).is_some()
    }

    async fn load_all(&self) -> Result<Vec<Project>> {
        self.documents
            .list(COLLECTION)
            .await?
            .iter()
            .map(Project::from_document)
            .collect()
    }

    async fn load_one(&self, id: &str) -> Result<Option<Project>> {
        require_id(id)?;
        self.documents
            .get(COLLECTION, id)
            .await?
            .map(|doc| Project::from_document(&doc))
            .transpose()
    }

    async fn create(&self, mut data: ProjectData) -> Result<Project> {
        data.validate()?;
        if let Some(cover) = data.cover_image_file.take() {
            data.cover_image_url = Some(upload_cover(self.blobs.as_ref(), &cover).await?);
        }
        let id = self.documents.create(COLLECTION, data.to_fields()).await?;
        Ok(data.into_project(id))
    }

    /// Cover URL currently attached to `id`, from the cache or the store
    async fn current_cover_url(&self, id: &str) -> Result<Option<String>> {
        let cached = self
            .state
            .borrow()
            .find(id)
            .map(|p| p.cover_image_url.clone());
        if let Some(url) = cached {
            return Ok(url);
        }

        let doc = self.documents.get(COLLECTION, id).await?;
        Ok(doc.and_then(|d| {
            d.fields
                .get(field::COVER_IMAGE_URL)
                .and_then(FieldValue::as_str)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
        }))
    }

    async fn patch(&self, id: &str, patch: ProjectPatch) -> Result<()> {
        require_id(id)?;
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::InvalidInput("Project name cannot be empty".to_string()));
        }
        if patch.client.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(Error::InvalidInput("Project client cannot be empty".to_string()));
        }

        let mut fields = patch.plain_fields();
        if let Some(cover) = &patch.cover_image_file {
            let prior = self.current_cover_url(id).await?;
            remove_cover_best_effort(self.blobs.as_ref(), prior.as_deref()).await;
            let url = upload_cover(self.blobs.as_ref(), cover).await?;
            fields.insert(field::COVER_IMAGE_URL.to_string(), FieldValue::from(url));
        } else if let Some(url) = &patch.cover_image_url {
            if url.is_empty() {
                let prior = self.current_cover_url(id).await?;
                remove_cover_best_effort(self.blobs.as_ref(), prior.as_deref()).await;
            }
            fields.insert(
                field::COVER_IMAGE_URL.to_string(),
                FieldValue::from(url.as_str()),
            );
        }

        self.documents.update(COLLECTION, id, fields).await?;

        if self.is_cached(id) {
            match self.load_one(id).await? {
                Some(fresh) => self.state.send_modify(|s| {
                    if let Some(entry) = s.find_mut(id) {
                        *entry = fresh;
                    }
                }),
                None => self.state.send_modify(|s| s.projects.retain(|p| p.id != id)),
            }
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        require_id(id)?;
        let cover = self.current_cover_url(id).await?;
        remove_cover_best_effort(self.blobs.as_ref(), cover.as_deref()).await;
        self.documents.delete(COLLECTION, id).await?;
        self.state.send_modify(|s| s.projects.retain(|p| p.id != id));
        Ok(())
    }
}

fn require_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(Error::InvalidInput("Project id cannot be empty".to_string()));
    }
    Ok(())
}
