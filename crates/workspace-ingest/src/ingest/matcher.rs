//! Matching reference tokens to workspace nodes.

use crate::archive::ArchiveDirectory;
use crate::error::{IngestError, Result};
use crate::handle::HandleUtil;
use crate::models::{NewNode, NodeStatus, WorkspaceId, WorkspaceNode};
use crate::store::WorkspaceStore;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Finds the node a reference token points at.
///
/// Candidates come from three pools, in order: the nodes of the current
/// batch, the nodes already persisted in the workspace, and the backing
/// archive.
pub struct NodeMatcher {
    store: Arc<dyn WorkspaceStore>,
    handles: Arc<dyn HandleUtil>,
    archive: Arc<dyn ArchiveDirectory>,
}

impl NodeMatcher {
    pub fn new(
        store: Arc<dyn WorkspaceStore>,
        handles: Arc<dyn HandleUtil>,
        archive: Arc<dyn ArchiveDirectory>,
    ) -> Self {
        Self {
            store,
            handles,
            archive,
        }
    }

    /// Match by handle identity.
    ///
    /// Fails with `DuplicateArchiveId` when several persisted nodes carry
    /// the handle.
    pub fn by_handle(
        &self,
        workspace_id: WorkspaceId,
        pool: &[WorkspaceNode],
        handle: &str,
    ) -> Result<Option<WorkspaceNode>> {
        for node in pool.iter().filter(|n| n.is_metadata()) {
            let Some(archive_id) = node.archive_id.as_deref() else {
                continue;
            };
            match self.handles.equivalent(archive_id, handle) {
                Ok(true) => {
                    debug!("Handle {} matched batch node {}", handle, node.id);
                    return Ok(Some(node.clone()));
                }
                Ok(false) => {}
                Err(e) => {
                    debug!("Skipping node {} in handle comparison: {}", node.id, e);
                }
            }
        }

        // Identifiers are persisted in canonical form.
        let canonical = self
            .handles
            .canonicalize(handle)
            .unwrap_or_else(|_| handle.trim().to_string());
        let mut persisted = self.store.nodes_with_archive_id(workspace_id, &canonical)?;
        match persisted.len() {
            0 => {}
            1 => {
                let node = persisted.remove(0);
                debug!("Handle {} matched workspace node {}", handle, node.id);
                return Ok(Some(node));
            }
            count => {
                return Err(IngestError::DuplicateArchiveId {
                    workspace_id,
                    archive_id: canonical,
                    count,
                });
            }
        }

        let Some(archived) = self.archive.resolve(handle)? else {
            debug!("Handle {} is unknown to the archive", handle);
            return Ok(None);
        };

        let working_location = if archived.url.scheme() == "file" {
            archived.url.to_file_path().ok()
        } else {
            None
        };
        let node = self.store.add_node(NewNode {
            workspace_id,
            name: archived.name,
            kind: archived.kind,
            working_location,
            archive_id: Some(
                self.handles
                    .canonicalize(&archived.handle)
                    .unwrap_or(archived.handle),
            ),
            archive_url: Some(archived.url),
            origin_url: None,
            status: NodeStatus::ExternalFromArchive,
            protected: false,
            media_type: archived.media_type,
        })?;
        debug!("Handle {} materialized from archive as node {}", handle, node.id);
        Ok(Some(node))
    }

    /// First node in `pool` whose working location contains `fragment`.
    pub fn by_path(&self, pool: &[WorkspaceNode], fragment: &str) -> Option<WorkspaceNode> {
        let fragment = normalize_fragment(fragment)?;
        pool.iter()
            .find(|node| {
                node.working_location_str()
                    .is_some_and(|location| location.contains(fragment.as_str()))
            })
            .cloned()
    }

    /// Wrap a non-local URL in a new external node.
    ///
    /// Returns `None` for text that is not a URL and for `file:` URLs.
    pub fn external(&self, workspace_id: WorkspaceId, uri: &str) -> Result<Option<WorkspaceNode>> {
        let url = match Url::parse(uri.trim()) {
            Ok(url) => url,
            Err(_) => return Ok(None),
        };
        if url.scheme() == "file" {
            return Ok(None);
        }
        let node = self.store.add_node(NewNode::external(workspace_id, url))?;
        debug!("Created external node {} for {}", node.id, uri);
        Ok(Some(node))
    }
}

/// Strip `./` prefixes and turn `file:` URLs into paths; `None` if empty.
fn normalize_fragment(fragment: &str) -> Option<String> {
    let mut fragment = fragment.trim();
    let owned;
    if fragment.starts_with("file:") {
        if let Some(path) = Url::parse(fragment).ok().and_then(|u| u.to_file_path().ok()) {
            owned = path.to_string_lossy().into_owned();
            fragment = owned.as_str();
        }
    }
    while let Some(rest) = fragment.strip_prefix("./") {
        fragment = rest;
    }
    if fragment.is_empty() {
        None
    } else {
        Some(fragment.to_string())
    }
}
