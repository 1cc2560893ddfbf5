//! Error types for workspace ingestion.
//!
//! Recoverable per-file and per-reference failures are reported as
//! [`ImportProblem`](crate::models::ImportProblem) values, not as errors.
//! `IngestError` covers the conditions that stop an operation outright.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the ingestion engine.
#[derive(Debug, Error)]
pub enum IngestError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Could not find a free file name for {name} in {dir}")]
    NameExhausted { dir: PathBuf, name: String },

    #[error("Unsafe archive entry name: {name}")]
    UnsafeEntryName { name: String },

    // Archive extraction errors
    #[error("Zip error: {message}")]
    Zip {
        message: String,
        #[source]
        source: Option<zip::result::ZipError>,
    },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Metadata errors
    #[error("Failed to parse metadata document {path}: {message}")]
    MetadataParse { path: PathBuf, message: String },

    #[error("Not a valid handle: {0}")]
    InvalidHandle(String),

    #[error("Type check failed for {path}: {message}")]
    TypeCheck { path: PathBuf, message: String },

    // Workspace state errors
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(i64),

    #[error("Node not found: {0}")]
    NodeNotFound(i64),

    #[error("{count} workspace nodes share archive identifier {archive_id} in workspace {workspace_id}")]
    DuplicateArchiveId {
        workspace_id: i64,
        archive_id: String,
        count: usize,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Task queue error: {0}")]
    Queue(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<zip::result::ZipError> for IngestError {
    fn from(err: zip::result::ZipError) -> Self {
        IngestError::Zip {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl IngestError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        IngestError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// True for errors that indicate corrupted workspace state upstream.
    ///
    /// These abort the resolution of the current node instead of being
    /// folded into a per-reference problem and skipped.
    pub fn is_internal_consistency(&self) -> bool {
        matches!(self, IngestError::DuplicateArchiveId { .. })
    }
}
