//! Projectboard Core Library
//!
//! This crate provides the core functionality for Projectboard, including:
//! - Project model and explicit document decoding
//! - Document store contract (in-memory, JSONL files, Firestore REST)
//! - Blob store contract (in-memory, local filesystem, Firebase Storage REST)
//! - The project repository with its observable state and derived view
//! - Configuration and backend selection

pub mod backend;
pub mod blob;
pub mod config;
pub mod document;
pub mod error;
pub mod project;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::blob::BlobStore;
    pub use crate::config::Config;
    pub use crate::document::DocumentStore;
    pub use crate::error::{Error, Result};
    pub use crate::project::{
        CoverImage, Project, ProjectData, ProjectPatch, ProjectRepository, ProjectState, SortBy,
    };
}
