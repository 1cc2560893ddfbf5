//! Workspace nodes and links.

use crate::handle::HandleUtil;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Identifier of a workspace.
pub type WorkspaceId = i64;

/// Identifier of a node, unique within its workspace.
pub type NodeId = i64;

/// What a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A metadata document that may reference other nodes.
    Metadata,
    /// A data resource (media, annotation, ...).
    Resource,
    /// An informational resource reached through an info reference.
    Info,
    /// Something outside the archive entirely.
    External,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Metadata => "metadata",
            NodeKind::Resource => "resource",
            NodeKind::Info => "info",
            NodeKind::External => "external",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "metadata" => Some(NodeKind::Metadata),
            "resource" => Some(NodeKind::Resource),
            "info" => Some(NodeKind::Info),
            "external" => Some(NodeKind::External),
            _ => None,
        }
    }
}

/// Lifecycle status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    /// Uploaded into the workspace.
    Uploaded,
    /// Copied out of the archive when the workspace was created.
    CopyOfArchived,
    /// Known to the archive but reached only by reference; not copied.
    ExternalFromArchive,
    /// Outside the archive.
    External,
    /// External node that has been removed from the workspace.
    DeletedExternal,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Uploaded => "uploaded",
            NodeStatus::CopyOfArchived => "copy-of-archived",
            NodeStatus::ExternalFromArchive => "external-from-archive",
            NodeStatus::External => "external",
            NodeStatus::DeletedExternal => "deleted-external",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uploaded" => Some(NodeStatus::Uploaded),
            "copy-of-archived" => Some(NodeStatus::CopyOfArchived),
            "external-from-archive" => Some(NodeStatus::ExternalFromArchive),
            "external" => Some(NodeStatus::External),
            "deleted-external" => Some(NodeStatus::DeletedExternal),
            _ => None,
        }
    }
}

/// A node in a workspace's working copy of an archive subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceNode {
    pub id: NodeId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub kind: NodeKind,
    /// Local working copy, absent for nodes without local content.
    pub working_location: Option<PathBuf>,
    /// Archive handle.
    pub archive_id: Option<String>,
    pub archive_url: Option<Url>,
    /// Where the file came from when that was outside the workspace.
    pub origin_url: Option<Url>,
    pub status: NodeStatus,
    pub protected: bool,
    pub media_type: Option<String>,
    pub created_at: String,
}

impl WorkspaceNode {
    pub fn is_metadata(&self) -> bool {
        self.kind == NodeKind::Metadata
    }

    /// Whether this node lies outside the archive.
    ///
    /// A handle under a known prefix makes a node internal, a foreign one
    /// external. Without a handle, a non-`file` archive URL marks it
    /// external.
    pub fn is_external(&self, handles: &dyn HandleUtil) -> bool {
        if self.kind == NodeKind::External {
            return true;
        }
        match (&self.archive_id, &self.archive_url) {
            (Some(id), _) => !handles.is_known_prefix(id),
            (None, Some(url)) => url.scheme() != "file",
            (None, None) => false,
        }
    }

    /// Working location as text, for containment matching.
    pub fn working_location_str(&self) -> Option<String> {
        self.working_location
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
    }
}

/// Fields needed to register a node; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub kind: NodeKind,
    pub working_location: Option<PathBuf>,
    pub archive_id: Option<String>,
    pub archive_url: Option<Url>,
    pub origin_url: Option<Url>,
    pub status: NodeStatus,
    pub protected: bool,
    pub media_type: Option<String>,
}

impl NewNode {
    /// A freshly uploaded file.
    pub fn uploaded(workspace_id: WorkspaceId, location: PathBuf, kind: NodeKind) -> Self {
        let name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            workspace_id,
            name,
            kind,
            working_location: Some(location),
            archive_id: None,
            archive_url: None,
            origin_url: None,
            status: NodeStatus::Uploaded,
            protected: false,
            media_type: None,
        }
    }

    /// A placeholder for something outside the archive.
    pub fn external(workspace_id: WorkspaceId, url: Url) -> Self {
        let name = url
            .path_segments()
            .and_then(|mut s| s.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| url.to_string());
        Self {
            workspace_id,
            name,
            kind: NodeKind::External,
            working_location: None,
            archive_id: None,
            archive_url: Some(url),
            origin_url: None,
            status: NodeStatus::External,
            protected: false,
            media_type: None,
        }
    }
}

/// A directed parent → child edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeLink {
    pub parent_id: NodeId,
    pub child_id: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleRules;

    fn node(kind: NodeKind, archive_id: Option<&str>, archive_url: Option<&str>) -> WorkspaceNode {
        WorkspaceNode {
            id: 1,
            workspace_id: 1,
            name: "n".into(),
            kind,
            working_location: None,
            archive_id: archive_id.map(String::from),
            archive_url: archive_url.map(|u| Url::parse(u).unwrap()),
            origin_url: None,
            status: NodeStatus::Uploaded,
            protected: false,
            media_type: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_external_classification() {
        let rules = HandleRules::new(["11142"]);
        assert!(!node(NodeKind::Metadata, Some("hdl:11142/a"), None).is_external(&rules));
        assert!(node(NodeKind::Metadata, Some("hdl:10.1/a"), None).is_external(&rules));
        assert!(node(NodeKind::Resource, None, Some("https://example.org/a")).is_external(&rules));
        assert!(!node(NodeKind::Resource, None, Some("file:///data/a.wav")).is_external(&rules));
        assert!(!node(NodeKind::Resource, None, None).is_external(&rules));
        assert!(node(NodeKind::External, None, None).is_external(&rules));
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            NodeStatus::Uploaded,
            NodeStatus::CopyOfArchived,
            NodeStatus::ExternalFromArchive,
            NodeStatus::External,
            NodeStatus::DeletedExternal,
        ] {
            assert_eq!(NodeStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_external_node_name() {
        let url = Url::parse("https://example.org/papers/intro.pdf").unwrap();
        let new = NewNode::external(4, url);
        assert_eq!(new.name, "intro.pdf");
        assert_eq!(new.kind, NodeKind::External);
        assert_eq!(new.status, NodeStatus::External);
    }
}
