use std::sync::Arc;

use serde::Serialize;

use super::entity::Project;
use super::view::{SortBy, ViewOptions, filter_and_sort};
use crate::error::Error;

/// Everything a consumer of the repository can observe
#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    /// Cached copy of the remote collection
    pub projects: Vec<Project>,
    pub loading: bool,
    /// Last failure, cleared when the next operation starts
    pub error: Option<Arc<Error>>,
    /// Always lower case
    pub search_term: String,
    pub show_favorites_only: bool,
    pub sort_by: SortBy,
}

impl ProjectState {
    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            search_term: self.search_term.clone(),
            favorites_only: self.show_favorites_only,
            sort_by: self.sort_by,
        }
    }

    pub fn filtered_and_sorted(&self) -> Vec<Project> {
        filter_and_sort(&self.projects, &self.view_options())
    }

    pub fn find(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.id == id)
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            total: self.projects.len(),
            favorites: self.projects.iter().filter(|p| p.is_favorite).count(),
            loading: self.loading,
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Serializable digest of the state for status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub total: usize,
    pub favorites: usize,
    pub loading: bool,
    pub error: Option<String>,
}
