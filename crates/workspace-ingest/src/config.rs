//! Centralized configuration for workspace ingestion.
//!
//! Constant tables live on unit structs; runtime settings live in
//! [`IngestConfig`], which can be loaded from a JSON file.

use crate::error::{IngestError, Result};
use crate::metadata::atomic_read_json;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory layout inside a workspace.
pub struct PathsConfig;

impl PathsConfig {
    pub const UPLOAD_DIR_NAME: &'static str = "upload";
    pub const ORPHANS_DIR_NAME: &'static str = "orphans";
    pub const DATABASE_FILENAME: &'static str = "workspaces.db";
}

/// Limits applied while storing uploads.
pub struct UploadConfig;

impl UploadConfig {
    /// How many `_N` suffixes are tried before giving up on a file name.
    pub const MAX_NAME_SUFFIX: u32 = 10_000;
    pub const MAX_NAME_LENGTH: usize = 200;
    /// Bytes read from the head of a file for type sniffing.
    pub const SNIFF_BYTES: usize = 64;
    /// Zip entries that are never materialized.
    pub const IGNORED_ZIP_PREFIXES: &'static [&'static str] = &["__MACOSX/"];
    pub const IGNORED_ZIP_NAMES: &'static [&'static str] = &[".DS_Store", "Thumbs.db"];
}

/// Defaults for handle recognition and media types.
pub struct MediaConfig;

impl MediaConfig {
    pub const DEFAULT_HANDLE_PREFIXES: &'static [&'static str] = &["11142", "1839"];
    pub const METADATA_MEDIA_TYPE: &'static str = "text/x-cmdi+xml";
    pub const DEFAULT_METADATA_EXTENSIONS: &'static [&'static str] = &["cmdi", "imdi"];
    pub const DEFAULT_ARCHIVABLE_TYPES: &'static [&'static str] = &[
        "text/x-cmdi+xml",
        "audio/x-wav",
        "video/mp4",
        "image/jpeg",
        "image/png",
        "application/pdf",
        "text/plain",
        "text/xml",
    ];
}

/// Runtime configuration for the ingestion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct IngestConfig {
    /// Root under which every workspace gets its own directory.
    pub workspaces_root: PathBuf,
    /// Staging area for files not yet attached to any workspace.
    ///
    /// Files processed from here are never deleted on rejection.
    pub orphans_dir: PathBuf,
    /// Handle prefixes that belong to the backing archive.
    pub known_handle_prefixes: Vec<String>,
    /// Media types treated as metadata documents.
    pub metadata_media_types: Vec<String>,
    /// File extensions recognised as metadata documents.
    pub metadata_extensions: Vec<String>,
    /// Media types the archive accepts.
    pub archivable_media_types: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workspaces_root: PathBuf::from("workspaces"),
            orphans_dir: PathBuf::from(PathsConfig::ORPHANS_DIR_NAME),
            known_handle_prefixes: to_strings(MediaConfig::DEFAULT_HANDLE_PREFIXES),
            metadata_media_types: vec![MediaConfig::METADATA_MEDIA_TYPE.to_string()],
            metadata_extensions: to_strings(MediaConfig::DEFAULT_METADATA_EXTENSIONS),
            archivable_media_types: to_strings(MediaConfig::DEFAULT_ARCHIVABLE_TYPES),
        }
    }
}

impl IngestConfig {
    /// Create a configuration rooted at `base`, with `workspaces/` and
    /// `orphans/` beneath it.
    pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            workspaces_root: base.join("workspaces"),
            orphans_dir: base.join(PathsConfig::ORPHANS_DIR_NAME),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file. Missing keys take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Option<IngestConfig> = atomic_read_json(path)?;
        let config = config.ok_or_else(|| IngestError::Config {
            message: format!("Configuration file not found: {}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.metadata_media_types.is_empty() {
            return Err(IngestError::Config {
                message: "metadata_media_types must not be empty".to_string(),
            });
        }
        if self.known_handle_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(IngestError::Config {
                message: "known_handle_prefixes contains an empty prefix".to_string(),
            });
        }
        Ok(())
    }

    /// Directory holding everything that belongs to one workspace.
    pub fn workspace_dir(&self, workspace_id: i64) -> PathBuf {
        self.workspaces_root.join(workspace_id.to_string())
    }

    /// Directory where uploads for one workspace are stored.
    pub fn upload_dir(&self, workspace_id: i64) -> PathBuf {
        self.workspace_dir(workspace_id)
            .join(PathsConfig::UPLOAD_DIR_NAME)
    }

    /// Whether `media_type` denotes a metadata document.
    pub fn is_metadata_type(&self, media_type: &str) -> bool {
        self.metadata_media_types.iter().any(|t| t == media_type)
    }

    /// Whether `path` lies inside the orphans staging area.
    pub fn is_orphan(&self, path: &Path) -> bool {
        path.starts_with(&self.orphans_dir)
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
