//! In-memory metadata document model.

use crate::models::Reference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether a document can carry references at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    #[default]
    Referencing,
    /// Standalone records (catalogue entries, profiles) without a reference list.
    Plain,
}

/// Header fields of a metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    /// The handle the document declares for itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_handle: Option<String>,
    /// Schema profile identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A parsed metadata document and the file it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(skip)]
    location: PathBuf,
    #[serde(default)]
    pub header: DocumentHeader,
    #[serde(default)]
    pub kind: DocumentKind,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl MetadataDocument {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            header: DocumentHeader::default(),
            kind: DocumentKind::Referencing,
            references: Vec::new(),
        }
    }

    /// File the document is read from and written back to.
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn set_location(&mut self, location: impl Into<PathBuf>) {
        self.location = location.into();
    }

    pub fn is_referencing(&self) -> bool {
        self.kind == DocumentKind::Referencing
    }

    /// Declared self-handle, ignoring blank values.
    pub fn self_handle(&self) -> Option<&str> {
        self.header
            .self_handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }

    pub fn reference(&self, id: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.id == id)
    }

    pub fn reference_mut(&mut self, id: &str) -> Option<&mut Reference> {
        self.references.iter_mut().find(|r| r.id == id)
    }

    /// Remove a reference by id, returning it if present.
    pub fn remove_reference(&mut self, id: &str) -> Option<Reference> {
        let index = self.references.iter().position(|r| r.id == id)?;
        Some(self.references.remove(index))
    }

    pub fn with_self_handle(mut self, handle: impl Into<String>) -> Self {
        self.header.self_handle = Some(handle.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.header.profile = Some(profile.into());
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferenceType;

    #[test]
    fn test_remove_reference() {
        let mut doc = MetadataDocument::new("/ws/session.cmdi")
            .with_reference(Reference::new("r1", ReferenceType::Resource))
            .with_reference(Reference::new("r2", ReferenceType::Metadata));

        let removed = doc.remove_reference("r1").unwrap();
        assert_eq!(removed.id, "r1");
        assert!(doc.reference("r1").is_none());
        assert!(doc.reference("r2").is_some());
        assert!(doc.remove_reference("r1").is_none());
    }

    #[test]
    fn test_blank_self_handle() {
        let doc = MetadataDocument::new("/ws/a.cmdi").with_self_handle("  ");
        assert!(doc.self_handle().is_none());
    }
}
