//! Lookup of nodes in the backing archive.

use crate::error::{IngestError, Result};
use crate::handle::Handle;
use crate::models::NodeKind;
use std::collections::HashMap;
use std::sync::RwLock;
use url::Url;

/// A node known to the backing archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveNode {
    /// Canonical handle of the node.
    pub handle: String,
    /// Current location of the node's content.
    pub url: Url,
    pub kind: NodeKind,
    pub name: String,
    pub media_type: Option<String>,
}

/// The archive's node directory.
pub trait ArchiveDirectory: Send + Sync {
    /// Find the archive node a handle points to.
    fn resolve(&self, handle: &str) -> Result<Option<ArchiveNode>>;
}

/// Archive directory backed by a map, keyed by case-folded canonical handle.
#[derive(Debug, Default)]
pub struct InMemoryArchive {
    nodes: RwLock<HashMap<String, ArchiveNode>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Fails when its handle does not parse or the
    /// directory lock is poisoned.
    pub fn insert(&self, node: ArchiveNode) -> Result<()> {
        let key = lookup_key(&node.handle)?;
        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| IngestError::Other(format!("archive directory lock poisoned: {}", e)))?;
        nodes.insert(key, node);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.read().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArchiveDirectory for InMemoryArchive {
    fn resolve(&self, handle: &str) -> Result<Option<ArchiveNode>> {
        let key = match lookup_key(handle) {
            Ok(key) => key,
            Err(_) => return Ok(None),
        };
        let nodes = self
            .nodes
            .read()
            .map_err(|e| IngestError::Other(format!("archive directory lock poisoned: {}", e)))?;
        Ok(nodes.get(&key).cloned())
    }
}

fn lookup_key(handle: &str) -> Result<String> {
    Ok(Handle::parse(handle)?.to_hdl_uri().to_ascii_lowercase())
}
