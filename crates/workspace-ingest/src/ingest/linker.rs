//! Parent/child links with the single-parent rule.

use crate::handle::HandleUtil;
use crate::models::{ImportProblem, WorkspaceNode};
use crate::store::WorkspaceStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Creates links in the workspace graph.
///
/// A node has at most one logical parent. A further parent is accepted only
/// when it is handle-equivalent to every existing parent, i.e. the same node
/// reached another way.
pub struct LinkEstablisher {
    store: Arc<dyn WorkspaceStore>,
    handles: Arc<dyn HandleUtil>,
}

impl LinkEstablisher {
    pub fn new(store: Arc<dyn WorkspaceStore>, handles: Arc<dyn HandleUtil>) -> Self {
        Self { store, handles }
    }

    /// Link `parent` → `child`, or describe why not.
    pub fn link(
        &self,
        parent: &WorkspaceNode,
        child: &WorkspaceNode,
    ) -> std::result::Result<(), ImportProblem> {
        let existing = self.store.parents_of(child.id).map_err(|e| ImportProblem::Link {
            parent: parent.clone(),
            child: child.clone(),
            message: "Could not look up existing parents".to_string(),
            cause: Some(e.to_string()),
        })?;

        if let Some(conflict) = existing
            .iter()
            .find(|current| !self.same_logical_node(current, parent))
        {
            warn!(
                "Rejected link {} -> {}: already child of {}",
                parent.id, child.id, conflict.id
            );
            return Err(ImportProblem::Link {
                parent: parent.clone(),
                child: child.clone(),
                message: format!(
                    "{} already has parent {} ({})",
                    child.name, conflict.name, conflict.id
                ),
                cause: None,
            });
        }

        let created = self
            .store
            .add_link(parent.workspace_id, parent.id, child.id)
            .map_err(|e| ImportProblem::Link {
                parent: parent.clone(),
                child: child.clone(),
                message: "Could not store link".to_string(),
                cause: Some(e.to_string()),
            })?;

        if created {
            debug!("Linked {} -> {}", parent.id, child.id);
        } else {
            debug!("Link {} -> {} already present", parent.id, child.id);
        }
        Ok(())
    }

    /// Same node, or both carry equivalent handles. Comparison errors count
    /// as different.
    fn same_logical_node(&self, a: &WorkspaceNode, b: &WorkspaceNode) -> bool {
        if a.id == b.id {
            return true;
        }
        match (a.archive_id.as_deref(), b.archive_id.as_deref()) {
            (Some(x), Some(y)) => self.handles.equivalent(x, y).unwrap_or_else(|e| {
                debug!("Treating {} and {} as different parents: {}", a.id, b.id, e);
                false
            }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::HandleRules;
    use crate::models::{NewNode, NodeKind, WorkspaceId};
    use crate::store::SqliteWorkspaceStore;

    fn setup() -> (Arc<SqliteWorkspaceStore>, LinkEstablisher, WorkspaceId) {
        let store = Arc::new(SqliteWorkspaceStore::in_memory().unwrap());
        let ws = store.create_workspace(None).unwrap();
        let linker = LinkEstablisher::new(store.clone(), Arc::new(HandleRules::new(["11142"])));
        (store, linker, ws)
    }

    fn node(
        store: &SqliteWorkspaceStore,
        ws: WorkspaceId,
        path: &str,
        kind: NodeKind,
        handle: Option<&str>,
    ) -> WorkspaceNode {
        let mut new = NewNode::uploaded(ws, path.into(), kind);
        new.archive_id = handle.map(String::from);
        store.add_node(new).unwrap()
    }

    #[test]
    fn test_first_parent_links() {
        let (store, linker, ws) = setup();
        let parent = node(&store, ws, "/ws/s.cmdi", NodeKind::Metadata, None);
        let child = node(&store, ws, "/ws/a.wav", NodeKind::Resource, None);

        linker.link(&parent, &child).unwrap();
        assert_eq!(store.parents_of(child.id).unwrap().len(), 1);
    }

    #[test]
    fn test_relinking_same_parent_is_fine() {
        let (store, linker, ws) = setup();
        let parent = node(&store, ws, "/ws/s.cmdi", NodeKind::Metadata, None);
        let child = node(&store, ws, "/ws/a.wav", NodeKind::Resource, None);

        linker.link(&parent, &child).unwrap();
        linker.link(&parent, &child).unwrap();
        assert_eq!(store.links(ws).unwrap().len(), 1);
    }

    #[test]
    fn test_equivalent_parents_accepted() {
        let (store, linker, ws) = setup();
        let first = node(&store, ws, "/ws/s.cmdi", NodeKind::Metadata, Some("hdl:11142/00-S"));
        let second = node(
            &store,
            ws,
            "/ws/upload/s.cmdi",
            NodeKind::Metadata,
            Some("https://hdl.handle.net/11142/00-s"),
        );
        let child = node(&store, ws, "/ws/a.wav", NodeKind::Resource, None);

        linker.link(&first, &child).unwrap();
        linker.link(&second, &child).unwrap();
        assert_eq!(store.parents_of(child.id).unwrap().len(), 2);
    }

    #[test]
    fn test_conflicting_parent_rejected() {
        let (store, linker, ws) = setup();
        let first = node(&store, ws, "/ws/s.cmdi", NodeKind::Metadata, Some("hdl:11142/00-S"));
        let second = node(&store, ws, "/ws/t.cmdi", NodeKind::Metadata, Some("hdl:11142/00-T"));
        let child = node(&store, ws, "/ws/a.wav", NodeKind::Resource, None);

        linker.link(&first, &child).unwrap();
        let problem = linker.link(&second, &child).unwrap_err();
        assert!(problem.is_link());

        let parents = store.parents_of(child.id).unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, first.id);
    }

    #[test]
    fn test_unparseable_handles_conflict() {
        let (store, linker, ws) = setup();
        let first = node(&store, ws, "/ws/s.cmdi", NodeKind::Metadata, Some("session-1"));
        let second = node(&store, ws, "/ws/t.cmdi", NodeKind::Metadata, Some("session-1"));
        let child = node(&store, ws, "/ws/a.wav", NodeKind::Resource, None);

        linker.link(&first, &child).unwrap();
        assert!(linker.link(&second, &child).is_err());
    }
}
