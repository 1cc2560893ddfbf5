//! File type detection and archivability.
//!
//! Determines the media type of an uploaded file from its leading bytes,
//! falling back to the extension, and decides whether the archive accepts
//! that type under the workspace's top node.

use crate::config::{IngestConfig, MediaConfig, UploadConfig};
use crate::error::{IngestError, Result};
use std::io::Read;
use std::path::Path;
use url::Url;

/// Magic bytes for content sniffing.
mod magic {
    pub const RIFF: &[u8; 4] = b"RIFF";
    pub const WAVE: &[u8; 4] = b"WAVE";
    pub const PNG: &[u8; 8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    pub const JPEG: &[u8; 3] = &[0xFF, 0xD8, 0xFF];
    pub const PDF: &[u8; 5] = b"%PDF-";
    pub const ZIP: &[u8; 4] = &[0x50, 0x4B, 0x03, 0x04];
    /// `ftyp` box at offset 4 of ISO media files.
    pub const FTYP: &[u8; 4] = b"ftyp";
    pub const XML: &[u8; 5] = b"<?xml";
}

/// Outcome of a type check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCheck {
    pub media_type: String,
}

/// Outcome of an archivability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archivability {
    pub archivable: bool,
    pub message: String,
}

impl Archivability {
    pub fn accepted() -> Self {
        Self {
            archivable: true,
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            archivable: false,
            message: message.into(),
        }
    }
}

/// Type detection service for uploaded files.
pub trait TypeChecker: Send + Sync {
    /// Determine the media type of `file`.
    fn check(&self, file: &Path) -> Result<TypeCheck>;

    /// Whether a file of the checked type may be archived under `top_location`.
    fn is_archivable(&self, check: &TypeCheck, top_location: Option<&Url>) -> Archivability;
}

/// Default [`TypeChecker`] that sniffs content and consults the config.
#[derive(Debug, Clone)]
pub struct SniffingTypeChecker {
    metadata_extensions: Vec<String>,
    metadata_media_type: String,
    archivable_types: Vec<String>,
}

impl SniffingTypeChecker {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            metadata_extensions: config
                .metadata_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
            metadata_media_type: config
                .metadata_media_types
                .first()
                .cloned()
                .unwrap_or_else(|| MediaConfig::METADATA_MEDIA_TYPE.to_string()),
            archivable_types: config.archivable_media_types.clone(),
        }
    }
}

impl TypeChecker for SniffingTypeChecker {
    fn check(&self, file: &Path) -> Result<TypeCheck> {
        let mut handle = std::fs::File::open(file).map_err(|e| IngestError::io_with_path(e, file))?;
        let mut header = [0u8; UploadConfig::SNIFF_BYTES];
        let read = handle
            .read(&mut header)
            .map_err(|e| IngestError::io_with_path(e, file))?;

        if read == 0 {
            return Err(IngestError::TypeCheck {
                path: file.to_path_buf(),
                message: "File is empty".to_string(),
            });
        }

        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        if self.metadata_extensions.contains(&extension) {
            return Ok(TypeCheck {
                media_type: self.metadata_media_type.clone(),
            });
        }

        detect_media_type(&header[..read], &extension)
            .map(|media_type| TypeCheck {
                media_type: media_type.to_string(),
            })
            .ok_or_else(|| IngestError::TypeCheck {
                path: file.to_path_buf(),
                message: "Unrecognised file type".to_string(),
            })
    }

    fn is_archivable(&self, check: &TypeCheck, top_location: Option<&Url>) -> Archivability {
        let Some(top) = top_location else {
            return Archivability::rejected("Workspace has no top node to archive into");
        };
        if self.archivable_types.iter().any(|t| t == &check.media_type) {
            Archivability::accepted()
        } else {
            Archivability::rejected(format!(
                "Files of type {} cannot be archived under {}",
                check.media_type, top
            ))
        }
    }
}

/// Detect a media type from leading bytes, then from the extension.
fn detect_media_type(header: &[u8], extension: &str) -> Option<&'static str> {
    if header.len() >= 12 && &header[..4] == magic::RIFF && &header[8..12] == magic::WAVE {
        return Some("audio/x-wav");
    }
    if header.starts_with(magic::PNG) {
        return Some("image/png");
    }
    if header.starts_with(magic::JPEG) {
        return Some("image/jpeg");
    }
    if header.starts_with(magic::PDF) {
        return Some("application/pdf");
    }
    if header.len() >= 8 && &header[4..8] == magic::FTYP {
        return Some("video/mp4");
    }
    if header.starts_with(magic::ZIP) {
        return Some("application/zip");
    }
    if header.starts_with(magic::XML) {
        return Some("text/xml");
    }

    match extension {
        "wav" => Some("audio/x-wav"),
        "mp4" => Some("video/mp4"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "pdf" => Some("application/pdf"),
        "xml" | "eaf" => Some("text/xml"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn checker() -> SniffingTypeChecker {
        SniffingTypeChecker::new(&IngestConfig::default())
    }

    fn wav_bytes() -> Vec<u8> {
        let mut bytes = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
        bytes.extend_from_slice(&[0u8; 24]);
        bytes
    }

    #[test]
    fn test_sniff_wav_regardless_of_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("recording.bin");
        std::fs::write(&path, wav_bytes()).unwrap();
        assert_eq!(checker().check(&path).unwrap().media_type, "audio/x-wav");
    }

    #[test]
    fn test_metadata_by_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.CMDI");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(
            checker().check(&path).unwrap().media_type,
            MediaConfig::METADATA_MEDIA_TYPE
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        let temp = TempDir::new().unwrap();
        let unknown = temp.path().join("tool.exe");
        std::fs::write(&unknown, b"MZ\x90\x00").unwrap();
        assert!(matches!(
            checker().check(&unknown),
            Err(IngestError::TypeCheck { .. })
        ));

        let empty = temp.path().join("empty.wav");
        std::fs::write(&empty, b"").unwrap();
        assert!(checker().check(&empty).is_err());
    }

    #[test]
    fn test_archivability() {
        let top = Url::parse("https://archive.example.org/corpus/1").unwrap();
        let wav = TypeCheck {
            media_type: "audio/x-wav".into(),
        };
        let zip = TypeCheck {
            media_type: "application/zip".into(),
        };

        assert!(checker().is_archivable(&wav, Some(&top)).archivable);
        let rejected = checker().is_archivable(&zip, Some(&top));
        assert!(!rejected.archivable);
        assert!(rejected.message.contains("application/zip"));
        assert!(!checker().is_archivable(&wav, None).archivable);
    }
}
