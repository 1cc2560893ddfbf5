//! Reading and writing metadata documents.

use super::atomic::atomic_write_json;
use super::document::MetadataDocument;
use crate::error::{IngestError, Result};
use std::path::Path;

/// Serialization of metadata documents to and from files.
pub trait MetadataCodec: Send + Sync {
    /// Parse the document stored at `path`.
    ///
    /// The returned document remembers `path` as its location.
    fn parse(&self, path: &Path) -> Result<MetadataDocument>;

    /// Write `doc` to `path`.
    fn write(&self, doc: &MetadataDocument, path: &Path) -> Result<()>;
}

/// Stores documents as JSON, replacing files atomically.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMetadataCodec;

impl MetadataCodec for JsonMetadataCodec {
    fn parse(&self, path: &Path) -> Result<MetadataDocument> {
        let contents = std::fs::read_to_string(path).map_err(|e| IngestError::io_with_path(e, path))?;
        let mut doc: MetadataDocument =
            serde_json::from_str(&contents).map_err(|e| IngestError::MetadataParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        doc.set_location(path);
        Ok(doc)
    }

    fn write(&self, doc: &MetadataDocument, path: &Path) -> Result<()> {
        atomic_write_json(path, doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Reference, ReferenceType};
    use tempfile::TempDir;

    #[test]
    fn test_parse_sets_location() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("session.cmdi");
        let doc = MetadataDocument::new(&path)
            .with_self_handle("hdl:11142/00-1")
            .with_reference(Reference::new("r1", ReferenceType::Resource).with_location("a.wav"));

        JsonMetadataCodec.write(&doc, &path).unwrap();
        let parsed = JsonMetadataCodec.parse(&path).unwrap();

        assert_eq!(parsed.location(), path.as_path());
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_parse_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.cmdi");
        std::fs::write(&path, "<CMD><unclosed").unwrap();

        let err = JsonMetadataCodec.parse(&path).unwrap_err();
        assert!(matches!(err, IngestError::MetadataParse { .. }));
    }
}
