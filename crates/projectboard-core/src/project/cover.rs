//! Cover image upload and best-effort removal

use chrono::Utc;
use tracing::{debug, warn};

use super::entity::CoverImage;
use crate::blob::{BlobStore, cover_path};
use crate::error::{Error, Result};

/// Outcome of removing a cover blob that no caller is allowed to fail on
#[derive(Debug)]
pub enum CoverCleanup {
    /// There was no cover to remove
    Skipped,
    Removed,
    /// The blob was already gone
    Missing,
    /// Removal failed; the operation carries on regardless
    Failed(Error),
}

impl CoverCleanup {
    pub fn is_failed(&self) -> bool {
        matches!(self, CoverCleanup::Failed(_))
    }
}

/// Delete the blob behind `url`, never failing the caller
pub async fn remove_cover_best_effort(blobs: &dyn BlobStore, url: Option<&str>) -> CoverCleanup {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return CoverCleanup::Skipped;
    };

    match blobs.delete(url).await {
        Ok(()) => {
            debug!(url = %url, "Removed cover image");
            CoverCleanup::Removed
        }
        Err(e) if e.is_not_found() => {
            debug!(url = %url, "Cover image already gone");
            CoverCleanup::Missing
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to remove cover image");
            CoverCleanup::Failed(e)
        }
    }
}

/// Upload a cover under a timestamped path and resolve its public URL
pub async fn upload_cover(blobs: &dyn BlobStore, cover: &CoverImage) -> Result<String> {
    let path = cover_path(&cover.file_name, Utc::now());
    let handle = blobs
        .put(&path, cover.bytes.clone(), cover.content_type.as_deref())
        .await?;
    let url = blobs.url(&handle).await?;
    debug!(path = %handle.path, bytes = cover.bytes.len(), "Uploaded cover image");
    Ok(url)
}
