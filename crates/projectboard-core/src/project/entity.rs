//! Project entity and its document encoding

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::document::{Document, FieldValue, Fields};
use crate::error::{Error, Result};

/// Name of the collection holding project documents
pub const COLLECTION: &str = "projects";

/// Document field names
pub mod field {
    pub const NAME: &str = "name";
    pub const CLIENT: &str = "client";
    pub const START_DATE: &str = "startDate";
    pub const END_DATE: &str = "endDate";
    pub const IS_FAVORITE: &str = "isFavorite";
    pub const COVER_IMAGE_URL: &str = "coverImageUrl";
}

/// A date as stored on a project: free text or a backend timestamp
///
/// Serialize only; documents are decoded through [`Project::from_document`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DateValue {
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl DateValue {
    /// Instant this date denotes, if it can be read as one
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DateValue::Timestamp(t) => Some(*t),
            DateValue::Text(s) => parse_date_text(s),
        }
    }

    /// Milliseconds since the Unix epoch, if the date can be read
    pub fn millis(&self) -> Option<i64> {
        self.to_datetime().map(|t| t.timestamp_millis())
    }

    fn to_field(&self) -> FieldValue {
        match self {
            DateValue::Timestamp(t) => FieldValue::Timestamp(*t),
            DateValue::Text(s) => FieldValue::String(s.clone()),
        }
    }
}

impl From<&str> for DateValue {
    fn from(value: &str) -> Self {
        DateValue::Text(value.to_string())
    }
}

impl From<String> for DateValue {
    fn from(value: String) -> Self {
        DateValue::Text(value)
    }
}

impl From<DateTime<Utc>> for DateValue {
    fn from(value: DateTime<Utc>) -> Self {
        DateValue::Timestamp(value)
    }
}

impl std::fmt::Display for DateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateValue::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            DateValue::Text(s) => f.write_str(s),
        }
    }
}

/// Parse a text date: RFC 3339, then a naive date-time, then a bare date
///
/// Naive forms are read as UTC; a bare date is midnight UTC.
pub fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// A project as held in the repository cache
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Store-assigned identifier
    pub id: String,
    pub name: String,
    pub client: String,
    pub start_date: Option<DateValue>,
    pub end_date: Option<DateValue>,
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

impl Project {
    /// Decode a stored document
    ///
    /// `name` and `client` must be strings. Dates may be strings or
    /// timestamps. A missing `isFavorite` reads as false; a missing, null, or
    /// empty `coverImageUrl` reads as no cover.
    pub fn from_document(doc: &Document) -> Result<Self> {
        if doc.id.is_empty() {
            return Err(Error::malformed("", "document has no id"));
        }
        let fields = &doc.fields;

        Ok(Self {
            id: doc.id.clone(),
            name: required_string(doc, field::NAME)?,
            client: required_string(doc, field::CLIENT)?,
            start_date: optional_date(doc, field::START_DATE)?,
            end_date: optional_date(doc, field::END_DATE)?,
            is_favorite: match fields.get(field::IS_FAVORITE) {
                None | Some(FieldValue::Null) => false,
                Some(FieldValue::Boolean(b)) => *b,
                Some(other) => return Err(wrong_kind(doc, field::IS_FAVORITE, "boolean", other)),
            },
            cover_image_url: match fields.get(field::COVER_IMAGE_URL) {
                None | Some(FieldValue::Null) => None,
                Some(FieldValue::String(s)) if s.is_empty() => None,
                Some(FieldValue::String(s)) => Some(s.clone()),
                Some(other) => {
                    return Err(wrong_kind(doc, field::COVER_IMAGE_URL, "string", other));
                }
            },
        })
    }

    pub fn has_cover(&self) -> bool {
        self.cover_image_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

fn wrong_kind(doc: &Document, name: &str, expected: &str, got: &FieldValue) -> Error {
    Error::malformed(
        &doc.id,
        format!("field `{}` should be a {}, found {}", name, expected, got.kind()),
    )
}

fn required_string(doc: &Document, name: &str) -> Result<String> {
    match doc.fields.get(name) {
        Some(FieldValue::String(s)) => Ok(s.clone()),
        Some(other) => Err(wrong_kind(doc, name, "string", other)),
        None => Err(Error::malformed(
            &doc.id,
            format!("missing required field `{}`", name),
        )),
    }
}

fn optional_date(doc: &Document, name: &str) -> Result<Option<DateValue>> {
    match doc.fields.get(name) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::String(s)) => Ok(Some(DateValue::Text(s.clone()))),
        Some(FieldValue::Timestamp(t)) => Ok(Some(DateValue::Timestamp(*t))),
        Some(other) => Err(wrong_kind(doc, name, "string or timestamp", other)),
    }
}

/// Image file to upload as a project cover; never persisted as-is
#[derive(Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverImage")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl CoverImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).map(str::to_string);
        Self {
            file_name,
            bytes,
            content_type,
        }
    }

    /// Read an image from disk, guessing its content type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidInput(format!("Not a file path: {}", path.display()))
            })?;
        Ok(Self::new(file_name, bytes))
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

/// Input for creating a project
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectData {
    pub name: String,
    pub client: String,
    pub start_date: DateValue,
    pub end_date: DateValue,
    pub is_favorite: bool,
    pub cover_image_url: Option<String>,
    pub cover_image_file: Option<CoverImage>,
}

impl ProjectData {
    pub fn new(
        name: impl Into<String>,
        client: impl Into<String>,
        start_date: impl Into<DateValue>,
        end_date: impl Into<DateValue>,
    ) -> Self {
        Self {
            name: name.into(),
            client: client.into(),
            start_date: start_date.into(),
            end_date: end_date.into(),
            is_favorite: false,
            cover_image_url: None,
            cover_image_file: None,
        }
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    pub fn with_cover(mut self, cover: CoverImage) -> Self {
        self.cover_image_file = Some(cover);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Project name cannot be empty".to_string()));
        }
        if self.client.trim().is_empty() {
            return Err(Error::InvalidInput("Project client cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Fields of the new document; the cover file is never included
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::NAME.to_string(), FieldValue::from(self.name.as_str()));
        fields.insert(field::CLIENT.to_string(), FieldValue::from(self.client.as_str()));
        fields.insert(field::START_DATE.to_string(), self.start_date.to_field());
        fields.insert(field::END_DATE.to_string(), self.end_date.to_field());
        fields.insert(field::IS_FAVORITE.to_string(), FieldValue::from(self.is_favorite));
        if let Some(url) = self.cover_image_url.as_deref().filter(|u| !u.is_empty()) {
            fields.insert(field::COVER_IMAGE_URL.to_string(), FieldValue::from(url));
        }
        fields
    }

    /// The project this data becomes once stored under `id`
    pub fn into_project(self, id: impl Into<String>) -> Project {
        Project {
            id: id.into(),
            name: self.name,
            client: self.client,
            start_date: Some(self.start_date),
            end_date: Some(self.end_date),
            is_favorite: self.is_favorite,
            cover_image_url: self.cover_image_url.filter(|u| !u.is_empty()),
        }
    }
}

/// Partial update of a project
///
/// Only fields that are `Some` are written. `cover_image_url: Some("")`
/// removes the current cover; `cover_image_file` replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub client: Option<String>,
    pub start_date: Option<DateValue>,
    pub end_date: Option<DateValue>,
    pub is_favorite: Option<bool>,
    pub cover_image_url: Option<String>,
    pub cover_image_file: Option<CoverImage>,
}

impl ProjectPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn start_date(mut self, date: impl Into<DateValue>) -> Self {
        self.start_date = Some(date.into());
        self
    }

    pub fn end_date(mut self, date: impl Into<DateValue>) -> Self {
        self.end_date = Some(date.into());
        self
    }

    pub fn favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = Some(is_favorite);
        self
    }

    pub fn cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_image_url = Some(url.into());
        self
    }

    pub fn remove_cover(mut self) -> Self {
        self.cover_image_url = Some(String::new());
        self.cover_image_file = None;
        self
    }

    pub fn cover_file(mut self, cover: CoverImage) -> Self {
        self.cover_image_file = Some(cover);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.client.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.is_favorite.is_none()
            && self.cover_image_url.is_none()
            && self.cover_image_file.is_none()
    }

    /// Plain fields to write, excluding anything cover-related
    pub fn plain_fields(&self) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = &self.name {
            fields.insert(field::NAME.to_string(), FieldValue::from(name.as_str()));
        }
        if let Some(client) = &self.client {
            fields.insert(field::CLIENT.to_string(), FieldValue::from(client.as_str()));
        }
        if let Some(date) = &self.start_date {
            fields.insert(field::START_DATE.to_string(), date.to_field());
        }
        if let Some(date) = &self.end_date {
            fields.insert(field::END_DATE.to_string(), date.to_field());
        }
        if let Some(fav) = self.is_favorite {
            fields.insert(field::IS_FAVORITE.to_string(), FieldValue::from(fav));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(fields: Vec<(&str, FieldValue)>) -> Document {
        Document::new(
            "doc-1",
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn test_decode_full_document() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let project = Project::from_document(&doc(vec![
            ("name", FieldValue::from("Website")),
            ("client", FieldValue::from("Acme")),
            ("startDate", FieldValue::from("2024-01-01")),
            ("endDate", FieldValue::Timestamp(ts)),
            ("isFavorite", FieldValue::from(true)),
            ("coverImageUrl", FieldValue::from("memory://blobs/covers/x.png")),
        ]))
        .unwrap();

        assert_eq!(project.id, "doc-1");
        assert_eq!(project.name, "Website");
        assert_eq!(project.start_date, Some(DateValue::Text("2024-01-01".to_string())));
        assert_eq!(project.end_date, Some(DateValue::Timestamp(ts)));
        assert!(project.is_favorite);
        assert!(project.has_cover());
    }

    #[test]
    fn test_decode_defaults() {
        let project = Project::from_document(&doc(vec![
            ("name", FieldValue::from("Website")),
            ("client", FieldValue::from("Acme")),
            ("coverImageUrl", FieldValue::from("")),
        ]))
        .unwrap();

        assert!(!project.is_favorite);
        assert_eq!(project.start_date, None);
        assert_eq!(project.cover_image_url, None);
    }

    #[test]
    fn test_decode_rejects_missing_name() {
        let err = Project::from_document(&doc(vec![("client", FieldValue::from("Acme"))]))
            .unwrap_err();
        assert!(err.to_string().contains("`name`"));
        assert!(err.to_string().contains("doc-1"));
    }

    #[test]
    fn test_decode_rejects_mistyped_fields() {
        let err = Project::from_document(&doc(vec![
            ("name", FieldValue::Integer(5)),
            ("client", FieldValue::from("Acme")),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));

        let err = Project::from_document(&doc(vec![
            ("name", FieldValue::from("x")),
            ("client", FieldValue::from("Acme")),
            ("isFavorite", FieldValue::from("yes")),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("isFavorite"));
    }

    #[test]
    fn test_parse_date_text_forms() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date_text("2024-01-01"), Some(midnight));
        assert_eq!(parse_date_text("2024-01-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_date_text("2024-01-01T02:00:00+02:00"), Some(midnight));
        assert_eq!(parse_date_text("2024-01-01T00:00"), Some(midnight));
        assert_eq!(parse_date_text("next tuesday"), None);
        assert_eq!(parse_date_text(""), None);
    }

    #[test]
    fn test_project_data_fields_omit_cover_when_absent() {
        let data = ProjectData::new("A", "B", "d1", "d2");
        let fields = data.to_fields();

        assert_eq!(fields[field::IS_FAVORITE], FieldValue::from(false));
        assert!(!fields.contains_key(field::COVER_IMAGE_URL));
        assert_eq!(fields.len(), 5);
    }

    #[test]
    fn test_project_data_validation() {
        assert!(ProjectData::new("A", "B", "d1", "d2").validate().is_ok());
        assert!(ProjectData::new("  ", "B", "d1", "d2").validate().is_err());
        assert!(ProjectData::new("A", "", "d1", "d2").validate().is_err());
    }

    #[test]
    fn test_patch_emptiness_and_fields() {
        assert!(ProjectPatch::new().is_empty());

        let patch = ProjectPatch::new().name("New").favorite(true);
        assert!(!patch.is_empty());
        let fields = patch.plain_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[field::NAME], FieldValue::from("New"));

        let removal = ProjectPatch::new().remove_cover();
        assert!(!removal.is_empty());
        assert!(removal.plain_fields().is_empty());
        assert_eq!(removal.cover_image_url.as_deref(), Some(""));
    }

    #[test]
    fn test_cover_image_content_type() {
        assert_eq!(
            CoverImage::new("logo.PNG", vec![]).content_type.as_deref(),
            Some("image/png")
        );
        assert_eq!(CoverImage::new("notes.txt", vec![]).content_type, None);
    }

    #[test]
    fn test_project_json_shape() {
        let project = Project {
            id: "p1".to_string(),
            name: "Site".to_string(),
            client: "Acme".to_string(),
            start_date: Some(DateValue::from("2024-01-01")),
            end_date: Some(DateValue::from(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())),
            is_favorite: true,
            cover_image_url: None,
        };

        let json = serde_json::to_value(&project).unwrap();

        assert_eq!(json["startDate"], "2024-01-01");
        assert_eq!(json["endDate"], "2024-03-01T12:00:00Z");
        assert_eq!(json["isFavorite"], true);
        assert!(json.get("coverImageUrl").is_none());
    }
}
