//! Cloud Firestore document store over the REST API
//!
//! Talks to `/v1/projects/{project}/databases/{database}/documents`:
//! - list: `GET /{collection}`, following `nextPageToken`
//! - get: `GET /{collection}/{id}`, 404 meaning "no such document"
//! - create: `POST /{collection}`, the id is the last segment of the
//!   returned document name
//! - update: `PATCH /{collection}/{id}` with one `updateMask.fieldPaths`
//!   per field and `currentDocument.exists=true`
//! - delete: `DELETE /{collection}/{id}`
//!
//! Field values use Firestore's typed JSON encoding (`stringValue`,
//! `booleanValue`, ...). Value kinds the project model has no use for
//! (maps, arrays, references, geo points, bytes) are dropped on read.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{Document, DocumentStore, FieldValue, Fields, validate_collection};
use crate::config::FirebaseConfig;
use crate::error::{Error, Result};

/// Page size requested when listing a collection
const LIST_PAGE_SIZE: u32 = 300;

#[derive(Debug, Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    next_page_token: Option<String>,
}

/// Firestore-backed document store
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    http_client: HttpClient,
    /// `.../documents` root of the database
    documents_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for FirestoreDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreDocumentStore")
            .field("documents_url", &self.documents_url)
            .field("api_key", &self.api_key.is_some())
            .finish()
    }
}

impl FirestoreDocumentStore {
    /// Build a store from configuration and an optional web API key
    pub fn new(config: &FirebaseConfig, api_key: Option<String>) -> Result<Self> {
        if config.project_id.trim().is_empty() {
            return Err(Error::ConfigError(
                "firebase.project_id is required for the Firestore backend".to_string(),
            ));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        let documents_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            config.firestore_endpoint.trim_end_matches('/'),
            config.project_id,
            config.database
        );
        Url::parse(&documents_url)
            .map_err(|e| Error::ConfigError(format!("Invalid Firestore endpoint: {}", e)))?;

        Ok(Self {
            http_client,
            documents_url,
            api_key,
        })
    }

    /// URL of a collection or of one document in it
    fn url(&self, collection: &str, id: Option<&str>) -> Result<Url> {
        validate_collection(collection)?;
        let mut url = Url::parse(&self.documents_url)
            .map_err(|e| Error::ConfigError(format!("Invalid Firestore endpoint: {}", e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                Error::ConfigError("Firestore endpoint cannot be a base URL".to_string())
            })?;
            segments.push(collection);
            if let Some(id) = id {
                if id.is_empty() {
                    return Err(Error::InvalidInput("Document id cannot be empty".to_string()));
                }
                segments.push(id);
            }
        }
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    async fn failure(response: Response, action: &str) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Error::DocumentStore(format!(
            "Firestore {} failed with {}: {}",
            action,
            status,
            firestore_error_message(&body)
        ))
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(collection, None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &LIST_PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.http_client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(Self::failure(response, "list").await);
            }

            let page: ListResponse = response.json().await?;
            for wire in page.documents {
                documents.push(decode_document(wire)?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(collection = %collection, count = documents.len(), "Listed Firestore documents");
        Ok(documents)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = self.url(collection, Some(id))?;
        let response = self.http_client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::failure(response, "get").await);
        }

        let wire: WireDocument = response.json().await?;
        decode_document(wire).map(Some)
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String> {
        let url = self.url(collection, None)?;
        let body = json!({ "fields": encode_fields(&fields) });

        let response = self.http_client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure(response, "create").await);
        }

        let wire: WireDocument = response.json().await?;
        let id = document_id(&wire.name).to_string();
        debug!(collection = %collection, document_id = %id, "Created Firestore document");
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        // A PATCH without a mask replaces the whole document
        if fields.is_empty() {
            return Ok(());
        }

        let mut url = self.url(collection, Some(id))?;
        {
            let mut query = url.query_pairs_mut();
            for name in fields.keys() {
                query.append_pair("updateMask.fieldPaths", &field_path(name));
            }
            query.append_pair("currentDocument.exists", "true");
        }
        let body = json!({ "fields": encode_fields(&fields) });

        let response = self.http_client.patch(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure(response, "update").await);
        }

        debug!(collection = %collection, document_id = %id, fields = fields.len(), "Updated Firestore document");
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let url = self.url(collection, Some(id))?;
        let response = self.http_client.delete(url).send().await?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(Self::failure(response, "delete").await);
        }

        debug!(collection = %collection, document_id = %id, "Deleted Firestore document");
        Ok(())
    }
}

/// Last segment of a full document resource name
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Quote a field name for use in a field path when it is not a plain
/// identifier
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Encode one value in Firestore's typed JSON form
pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(t) => {
            json!({ "timestampValue": t.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

/// Decode one typed value
///
/// `Ok(None)` means a value kind this crate does not model.
pub fn decode_value(value: &Value) -> std::result::Result<Option<FieldValue>, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("expected a typed value object, got {}", value))?;
    let (kind, inner) = object
        .iter()
        .next()
        .ok_or_else(|| "empty typed value object".to_string())?;

    let decoded = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Boolean(
            inner
                .as_bool()
                .ok_or_else(|| format!("booleanValue is not a boolean: {}", inner))?,
        ),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            FieldValue::Integer(
                parsed.ok_or_else(|| format!("integerValue is not an integer: {}", inner))?,
            )
        }
        "doubleValue" => FieldValue::Double(
            inner
                .as_f64()
                .ok_or_else(|| format!("doubleValue is not a number: {}", inner))?,
        ),
        "stringValue" => FieldValue::String(
            inner
                .as_str()
                .ok_or_else(|| format!("stringValue is not a string: {}", inner))?
                .to_string(),
        ),
        "timestampValue" => {
            let text = inner
                .as_str()
                .ok_or_else(|| format!("timestampValue is not a string: {}", inner))?;
            let parsed = DateTime::parse_from_rfc3339(text)
                .map_err(|e| format!("invalid timestampValue '{}': {}", text, e))?;
            FieldValue::Timestamp(parsed.with_timezone(&Utc))
        }
        _ => return Ok(None),
    };
    Ok(Some(decoded))
}

fn decode_document(wire: WireDocument) -> Result<Document> {
    let id = document_id(&wire.name).to_string();
    let mut fields = Fields::new();
    for (name, value) in &wire.fields {
        match decode_value(value) {
            Ok(Some(decoded)) => {
                fields.insert(name.clone(), decoded);
            }
            Ok(None) => {
                debug!(document_id = %id, field = %name, "Skipping unsupported Firestore value kind");
            }
            Err(reason) => return Err(Error::malformed(&id, format!("field `{}`: {}", name, reason))),
        }
    }
    Ok(Document::new(id, fields))
}

/// Pull `error.message` out of a Firestore error body, falling back to the
/// raw body
fn firestore_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
