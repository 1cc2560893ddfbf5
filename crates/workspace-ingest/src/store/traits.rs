//! Workspace persistence trait.

use crate::error::Result;
use crate::models::{NewNode, NodeId, NodeLink, WorkspaceId, WorkspaceNode};
use url::Url;

/// Storage for workspace nodes and links.
///
/// All operations are synchronous to match rusqlite's API. Implementations
/// must be safe to share between threads, but the engine never issues
/// concurrent writes for the same workspace.
pub trait WorkspaceStore: Send + Sync {
    /// Archive location of the workspace's top node.
    ///
    /// Fails with `WorkspaceNotFound` for unknown workspaces.
    fn top_node_url(&self, workspace_id: WorkspaceId) -> Result<Option<Url>>;

    /// Persist a new node and return it with its assigned id.
    fn add_node(&self, node: NewNode) -> Result<WorkspaceNode>;

    /// Overwrite the stored fields of an existing node.
    fn update_node(&self, node: &WorkspaceNode) -> Result<()>;

    fn get_node(&self, node_id: NodeId) -> Result<Option<WorkspaceNode>>;

    fn list_nodes(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceNode>>;

    /// Nodes whose archive identifier equals `archive_id`, ignoring ASCII case.
    fn nodes_with_archive_id(
        &self,
        workspace_id: WorkspaceId,
        archive_id: &str,
    ) -> Result<Vec<WorkspaceNode>>;

    /// Create a parent → child link.
    ///
    /// Returns `false` without error when the link already exists.
    fn add_link(&self, workspace_id: WorkspaceId, parent: NodeId, child: NodeId) -> Result<bool>;

    fn parents_of(&self, child: NodeId) -> Result<Vec<WorkspaceNode>>;

    fn children_of(&self, parent: NodeId) -> Result<Vec<WorkspaceNode>>;

    fn links(&self, workspace_id: WorkspaceId) -> Result<Vec<NodeLink>>;
}
