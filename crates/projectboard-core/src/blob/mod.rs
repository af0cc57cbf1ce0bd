//! Blob store contract
//!
//! Blob stores hold arbitrary byte payloads addressed by path and hand back
//! a retrievable URL for each written blob. Deleting accepts either the path
//! or a URL previously produced by the same store, and reports a missing
//! blob as [`Error::BlobNotFound`] so callers can tell it apart from a real
//! failure.

pub mod firebase;
pub mod fs;
pub mod memory;

use std::path::{Component, Path};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

pub use firebase::FirebaseStorageBlobStore;
pub use fs::FsBlobStore;
pub use memory::{BlobCall, BlobOp, MemoryBlobStore};

/// Directory under which cover images are written
pub const COVER_PREFIX: &str = "covers";

/// Opaque reference to a written blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHandle {
    /// Store-relative path of the blob
    pub path: String,
}

impl BlobHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Remote object-storage service
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` at `path`, replacing anything already there
    async fn put(&self, path: &str, data: Vec<u8>, content_type: Option<&str>)
    -> Result<BlobHandle>;

    /// Resolve the public URL of a written blob
    async fn url(&self, handle: &BlobHandle) -> Result<String>;

    /// Delete a blob by path or by a URL returned from [`url`](Self::url)
    ///
    /// Returns [`Error::BlobNotFound`] when nothing exists there.
    async fn delete(&self, url_or_path: &str) -> Result<()>;
}

/// Path for a new cover image: `covers/<unix-millis>_<file name>`
///
/// The timestamp prefix is assumed unique; there is no collision retry.
pub fn cover_path(file_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}_{}",
        COVER_PREFIX,
        now.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

/// Keep only the final component of `file_name`, with characters outside
/// `[A-Za-z0-9._-]` replaced by `_`
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "cover".to_string()
    } else {
        cleaned
    }
}

/// Reject absolute paths and paths that step outside the store root
pub(crate) fn validate_blob_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidInput("Blob path cannot be empty".to_string()));
    }
    let escapes = Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(Error::InvalidInput(format!(
            "Blob path must be relative and stay inside the store: '{}'",
            path
        )));
    }
    Ok(())
}
