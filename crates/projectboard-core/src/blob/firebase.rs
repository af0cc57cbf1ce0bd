//! Firebase Storage blob store over the REST API
//!
//! Objects live at `/v0/b/{bucket}/o/{url-encoded path}`. Uploads use the
//! media upload form; a download URL is built from the object's first
//! download token, the same URL the web SDK's `getDownloadURL` returns.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::{BlobHandle, BlobStore, validate_blob_path};
use crate::config::FirebaseConfig;
use crate::error::{Error, Result};

/// Characters left unescaped in an object name path segment
const OBJECT_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMetadata {
    name: String,
    #[serde(default)]
    download_tokens: Option<String>,
}

#[derive(Clone)]
pub struct FirebaseStorageBlobStore {
    http_client: HttpClient,
    endpoint: String,
    bucket: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for FirebaseStorageBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseStorageBlobStore")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("api_key", &self.api_key.is_some())
            .finish()
    }
}

impl FirebaseStorageBlobStore {
    pub fn new(config: &FirebaseConfig, api_key: Option<String>) -> Result<Self> {
        if config.storage_bucket.trim().is_empty() {
            return Err(Error::ConfigError(
                "firebase.storage_bucket is required for the Firebase Storage backend".to_string(),
            ));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let endpoint = config.storage_endpoint.trim_end_matches('/').to_string();
        Url::parse(&endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid Storage endpoint: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
            bucket: config.storage_bucket.trim().to_string(),
            api_key,
        })
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/v0/b/{}/o",
            self.endpoint,
            utf8_percent_encode(&self.bucket, OBJECT_NAME)
        )
    }

    fn object_url(&self, path: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.bucket_url(),
            utf8_percent_encode(path, OBJECT_NAME)
        );
        let mut url = Url::parse(&raw)
            .map_err(|e| Error::BlobStore(format!("Invalid object URL '{}': {}", raw, e)))?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    /// Object path named by a download URL, `gs://` URL, or plain path
    pub fn object_path(&self, url_or_path: &str) -> Result<String> {
        if let Some(rest) = url_or_path.strip_prefix("gs://") {
            let (bucket, path) = rest.split_once('/').ok_or_else(|| {
                Error::InvalidInput(format!("gs:// URL has no object path: {}", url_or_path))
            })?;
            if bucket != self.bucket {
                return Err(Error::InvalidInput(format!(
                    "Object belongs to bucket '{}', not '{}'",
                    bucket, self.bucket
                )));
            }
            return Ok(path.to_string());
        }

        if url_or_path.starts_with("http://") || url_or_path.starts_with("https://") {
            let url = Url::parse(url_or_path).map_err(|e| {
                Error::InvalidInput(format!("Invalid blob URL '{}': {}", url_or_path, e))
            })?;
            // The encoded object name is the segment right after `/o/`
            let encoded = url
                .path()
                .split_once("/o/")
                .map(|(_, name)| name)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    Error::InvalidInput(format!("Not a Firebase Storage URL: {}", url_or_path))
                })?;
            let decoded = percent_decode_str(encoded)
                .decode_utf8()
                .map_err(|e| Error::InvalidInput(format!("Invalid object name encoding: {}", e)))?;
            return Ok(decoded.into_owned());
        }

        Ok(url_or_path.to_string())
    }

    async fn failure(response: Response, action: &str) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Error::BlobStore(format!(
            "Firebase Storage {} failed with {}: {}",
            action,
            status,
            body.trim()
        ))
    }
}

#[async_trait]
impl BlobStore for FirebaseStorageBlobStore {
    async fn put(
        &self,
        path: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<BlobHandle> {
        validate_blob_path(path)?;

        let mut url = Url::parse(&self.bucket_url())
            .map_err(|e| Error::BlobStore(format!("Invalid bucket URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("uploadType", "media");
            query.append_pair("name", path);
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }

        let size = data.len();
        let response = self
            .http_client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.unwrap_or("application/octet-stream"),
            )
            .body(data)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response, "upload").await);
        }

        let metadata: ObjectMetadata = response.json().await?;
        debug!(path = %metadata.name, bytes = size, "Uploaded blob to Firebase Storage");
        Ok(BlobHandle::new(metadata.name))
    }

    async fn url(&self, handle: &BlobHandle) -> Result<String> {
        let response = self
            .http_client
            .get(self.object_url(&handle.path)?)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::BlobNotFound(handle.path.clone()));
        }
        if !response.status().is_success() {
            return Err(Self::failure(response, "metadata").await);
        }

        let metadata: ObjectMetadata = response.json().await?;
        let token = metadata
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::BlobStore(format!("Object '{}' has no download token", handle.path))
            })?;

        let mut url = Url::parse(&format!(
            "{}/{}",
            self.bucket_url(),
            utf8_percent_encode(&handle.path, OBJECT_NAME)
        ))
        .map_err(|e| Error::BlobStore(format!("Invalid object URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(url.to_string())
    }

    async fn delete(&self, url_or_path: &str) -> Result<()> {
        let path = self.object_path(url_or_path)?;
        validate_blob_path(&path)?;

        let response = self.http_client.delete(self.object_url(&path)?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::BlobNotFound(path));
        }
        if !response.status().is_success() {
            return Err(Self::failure(response, "delete").await);
        }

        debug!(path = %path, "Deleted blob from Firebase Storage");
        Ok(())
    }
}
