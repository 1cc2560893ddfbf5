//! In-place edits of metadata documents.
//!
//! Each operation changes the in-memory document and writes it back to the
//! file it was read from. On a write failure the in-memory change stays;
//! callers log and continue.

use crate::error::Result;
use crate::metadata::{MetadataCodec, MetadataDocument};
use std::sync::Arc;
use tracing::debug;

pub struct DocumentRewriter {
    codec: Arc<dyn MetadataCodec>,
}

impl DocumentRewriter {
    pub fn new(codec: Arc<dyn MetadataCodec>) -> Self {
        Self { codec }
    }

    /// Empty the URI of reference `ref_id`. No write if it is already empty.
    pub fn clear_reference_uri(&self, doc: &mut MetadataDocument, ref_id: &str) -> Result<()> {
        let Some(reference) = doc.reference_mut(ref_id) else {
            return Ok(());
        };
        if reference.uri.as_deref().map_or(true, str::is_empty) {
            return Ok(());
        }
        reference.uri = None;
        debug!("Cleared URI of reference {} in {}", ref_id, doc.location().display());
        self.persist(doc)
    }

    /// Drop reference `ref_id` from the document.
    pub fn remove_reference(&self, doc: &mut MetadataDocument, ref_id: &str) -> Result<()> {
        if doc.remove_reference(ref_id).is_none() {
            return Ok(());
        }
        debug!("Removed reference {} from {}", ref_id, doc.location().display());
        self.persist(doc)
    }

    /// Point reference `ref_id` at `location`. No write if unchanged.
    pub fn rewrite_location(
        &self,
        doc: &mut MetadataDocument,
        ref_id: &str,
        location: &str,
    ) -> Result<()> {
        let Some(reference) = doc.reference_mut(ref_id) else {
            return Ok(());
        };
        if reference.location.as_deref() == Some(location) {
            return Ok(());
        }
        reference.location = Some(location.to_string());
        debug!(
            "Rewrote location of reference {} in {} to {}",
            ref_id,
            doc.location().display(),
            location
        );
        self.persist(doc)
    }

    /// Remove the document's own handle.
    pub fn strip_self_handle(&self, doc: &mut MetadataDocument) -> Result<()> {
        if doc.header.self_handle.take().is_none() {
            return Ok(());
        }
        debug!("Stripped self-handle from {}", doc.location().display());
        self.persist(doc)
    }

    fn persist(&self, doc: &MetadataDocument) -> Result<()> {
        self.codec.write(doc, doc.location())
    }
}
