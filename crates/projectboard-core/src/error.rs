//! Error types for Projectboard

use thiserror::Error;

/// Result type alias using Projectboard's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Projectboard error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Project '{0}' not found. Run `projectboard list` to see all projects.")]
    ProjectNotFound(String),

    // Document store errors (E100-E199)
    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Document '{id}' is malformed: {reason}")]
    MalformedDocument { id: String, reason: String },

    // Blob store errors (E200-E299)
    #[error("Blob '{0}' not found")]
    BlobNotFound(String),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    // Network errors (E300-E399)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProjectNotFound(_) => "E001",
            Self::DocumentStore(_) => "E100",
            Self::MalformedDocument { .. } => "E101",
            Self::BlobNotFound(_) => "E200",
            Self::BlobStore(_) => "E201",
            Self::NetworkError(_) => "E300",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Serialization(_) | Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ProjectNotFound(_) => Some("projectboard list".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::ConfigError(_) => Some("projectboard config list".to_string()),
            _ => None,
        }
    }

    /// True for the "does not exist" kinds, which callers may treat as a
    /// valid negative result rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProjectNotFound(_) | Self::BlobNotFound(_))
    }

    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
