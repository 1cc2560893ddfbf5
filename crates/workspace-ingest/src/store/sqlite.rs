//! SQLite-backed workspace store.

use super::traits::WorkspaceStore;
use crate::error::{IngestError, Result};
use crate::models::{
    NewNode, NodeId, NodeKind, NodeLink, NodeStatus, WorkspaceId, WorkspaceNode,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use url::Url;

const NODE_COLUMNS: &str = "n.id, n.workspace_id, n.name, n.kind, n.working_location, \
     n.archive_id, n.archive_url, n.origin_url, n.status, n.protected, n.media_type, n.created_at";

/// SQLite workspace store.
///
/// Thread-safe via internal mutex on the connection.
pub struct SqliteWorkspaceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWorkspaceStore {
    /// Open (or create) a store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| IngestError::Io {
                    message: format!("Failed to create database directory: {}", e),
                    path: Some(parent.to_path_buf()),
                    source: Some(e),
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| IngestError::Database {
            message: format!("Failed to open workspace database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| IngestError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::from_connection(conn)
    }

    /// Store that lives only as long as the value.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| IngestError::Database {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS workspaces (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                top_node_url TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id INTEGER NOT NULL REFERENCES workspaces(id),
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                working_location TEXT,
                archive_id TEXT COLLATE NOCASE,
                archive_url TEXT,
                origin_url TEXT,
                status TEXT NOT NULL,
                protected INTEGER NOT NULL DEFAULT 0,
                media_type TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_archive_id
                ON nodes(workspace_id, archive_id);

            CREATE TABLE IF NOT EXISTS links (
                workspace_id INTEGER NOT NULL REFERENCES workspaces(id),
                parent_id INTEGER NOT NULL REFERENCES nodes(id),
                child_id INTEGER NOT NULL REFERENCES nodes(id),
                created_at TEXT NOT NULL,
                PRIMARY KEY (parent_id, child_id)
            );

            CREATE INDEX IF NOT EXISTS idx_links_child ON links(child_id);
            "#,
        )
        .map_err(|e| IngestError::Database {
            message: format!("Failed to initialize workspace schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| IngestError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    /// Create a workspace and return its id.
    pub fn create_workspace(&self, top_node_url: Option<&Url>) -> Result<WorkspaceId> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO workspaces (top_node_url, created_at) VALUES (?1, ?2)",
            params![top_node_url.map(Url::as_str), Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        debug!("Created workspace {}", id);
        Ok(id)
    }

    pub fn set_top_node_url(&self, workspace_id: WorkspaceId, url: Option<&Url>) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE workspaces SET top_node_url = ?1 WHERE id = ?2",
            params![url.map(Url::as_str), workspace_id],
        )?;
        if changed == 0 {
            return Err(IngestError::WorkspaceNotFound(workspace_id));
        }
        Ok(())
    }

    fn query_nodes(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<WorkspaceNode>> {
        let mut stmt = conn.prepare(sql)?;
        let nodes = stmt
            .query_map(params, row_to_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(nodes)
    }
}

impl WorkspaceStore for SqliteWorkspaceStore {
    fn top_node_url(&self, workspace_id: WorkspaceId) -> Result<Option<Url>> {
        let conn = self.lock()?;
        let row: Option<Option<String>> = conn
            .query_row(
                "SELECT top_node_url FROM workspaces WHERE id = ?1",
                params![workspace_id],
                |row| row.get(0),
            )
            .optional()?;

        match row {
            None => Err(IngestError::WorkspaceNotFound(workspace_id)),
            Some(None) => Ok(None),
            Some(Some(url)) => Url::parse(&url).map(Some).map_err(|e| IngestError::Database {
                message: format!("Stored top node URL '{}' is invalid: {}", url, e),
                source: None,
            }),
        }
    }

    fn add_node(&self, node: NewNode) -> Result<WorkspaceNode> {
        let conn = self.lock()?;
        let created_at = Utc::now().to_rfc3339();
        conn.execute(
            r#"
            INSERT INTO nodes (workspace_id, name, kind, working_location, archive_id,
                               archive_url, origin_url, status, protected, media_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                node.workspace_id,
                node.name,
                node.kind.as_str(),
                node.working_location
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                node.archive_id,
                node.archive_url.as_ref().map(Url::as_str),
                node.origin_url.as_ref().map(Url::as_str),
                node.status.as_str(),
                node.protected,
                node.media_type,
                created_at,
            ],
        )
        .map_err(|e| IngestError::Database {
            message: format!("Failed to insert node {}: {}", node.name, e),
            source: Some(e),
        })?;

        let id = conn.last_insert_rowid();
        debug!("Registered node {} ({}) in workspace {}", id, node.name, node.workspace_id);

        Ok(WorkspaceNode {
            id,
            workspace_id: node.workspace_id,
            name: node.name,
            kind: node.kind,
            working_location: node.working_location,
            archive_id: node.archive_id,
            archive_url: node.archive_url,
            origin_url: node.origin_url,
            status: node.status,
            protected: node.protected,
            media_type: node.media_type,
            created_at,
        })
    }

    fn update_node(&self, node: &WorkspaceNode) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            r#"
            UPDATE nodes SET name = ?2, kind = ?3, working_location = ?4, archive_id = ?5,
                             archive_url = ?6, origin_url = ?7, status = ?8, protected = ?9,
                             media_type = ?10
            WHERE id = ?1
            "#,
            params![
                node.id,
                node.name,
                node.kind.as_str(),
                node.working_location
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                node.archive_id,
                node.archive_url.as_ref().map(Url::as_str),
                node.origin_url.as_ref().map(Url::as_str),
                node.status.as_str(),
                node.protected,
                node.media_type,
            ],
        )?;
        if changed == 0 {
            return Err(IngestError::NodeNotFound(node.id));
        }
        Ok(())
    }

    fn get_node(&self, node_id: NodeId) -> Result<Option<WorkspaceNode>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM nodes n WHERE n.id = ?1", NODE_COLUMNS);
        Ok(conn
            .query_row(&sql, params![node_id], row_to_node)
            .optional()?)
    }

    fn list_nodes(&self, workspace_id: WorkspaceId) -> Result<Vec<WorkspaceNode>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.workspace_id = ?1 ORDER BY n.id",
            NODE_COLUMNS
        );
        Self::query_nodes(&conn, &sql, params![workspace_id])
    }

    fn nodes_with_archive_id(
        &self,
        workspace_id: WorkspaceId,
        archive_id: &str,
    ) -> Result<Vec<WorkspaceNode>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM nodes n WHERE n.workspace_id = ?1 AND n.archive_id = ?2 ORDER BY n.id",
            NODE_COLUMNS
        );
        Self::query_nodes(&conn, &sql, params![workspace_id, archive_id])
    }

    fn add_link(&self, workspace_id: WorkspaceId, parent: NodeId, child: NodeId) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO links (workspace_id, parent_id, child_id, created_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![workspace_id, parent, child, Utc::now().to_rfc3339()],
            )
            .map_err(|e| IngestError::Database {
                message: format!("Failed to link {} -> {}: {}", parent, child, e),
                source: Some(e),
            })?;
        Ok(inserted > 0)
    }

    fn parents_of(&self, child: NodeId) -> Result<Vec<WorkspaceNode>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM nodes n JOIN links l ON l.parent_id = n.id \
             WHERE l.child_id = ?1 ORDER BY n.id",
            NODE_COLUMNS
        );
        Self::query_nodes(&conn, &sql, params![child])
    }

    fn children_of(&self, parent: NodeId) -> Result<Vec<WorkspaceNode>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM nodes n JOIN links l ON l.child_id = n.id \
             WHERE l.parent_id = ?1 ORDER BY n.id",
            NODE_COLUMNS
        );
        Self::query_nodes(&conn, &sql, params![parent])
    }

    fn links(&self, workspace_id: WorkspaceId) -> Result<Vec<NodeLink>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT parent_id, child_id FROM links WHERE workspace_id = ?1 \
             ORDER BY parent_id, child_id",
        )?;
        let links = stmt
            .query_map(params![workspace_id], |row| {
                Ok(NodeLink {
                    parent_id: row.get(0)?,
                    child_id: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(links)
    }
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<WorkspaceNode> {
    let kind: String = row.get(3)?;
    let status: String = row.get(8)?;
    let working_location: Option<String> = row.get(4)?;

    Ok(WorkspaceNode {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        kind: NodeKind::parse(&kind).ok_or_else(|| conversion_error(3, "node kind", &kind))?,
        working_location: working_location.map(PathBuf::from),
        archive_id: row.get(5)?,
        archive_url: url_column(row, 6)?,
        origin_url: url_column(row, 7)?,
        status: NodeStatus::parse(&status)
            .ok_or_else(|| conversion_error(8, "node status", &status))?,
        protected: row.get(9)?,
        media_type: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn url_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Url>> {
    let value: Option<String> = row.get(idx)?;
    value
        .map(|v| Url::parse(&v).map_err(|e| conversion_error(idx, "URL", &e.to_string())))
        .transpose()
}

fn conversion_error(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid {}: {}", what, value).into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (SqliteWorkspaceStore, WorkspaceId) {
        let store = SqliteWorkspaceStore::in_memory().unwrap();
        let top = Url::parse("https://archive.example.org/corpus/top.cmdi").unwrap();
        let ws = store.create_workspace(Some(&top)).unwrap();
        (store, ws)
    }

    fn resource(ws: WorkspaceId, path: &str) -> NewNode {
        NewNode::uploaded(ws, PathBuf::from(path), NodeKind::Resource)
    }

    #[test]
    fn test_add_and_get_node() {
        let (store, ws) = setup();
        let node = store.add_node(resource(ws, "/ws/upload/a.wav")).unwrap();

        let loaded = store.get_node(node.id).unwrap().unwrap();
        assert_eq!(loaded, node);
        assert_eq!(loaded.name, "a.wav");
        assert_eq!(loaded.status, NodeStatus::Uploaded);
    }

    #[test]
    fn test_update_node() {
        let (store, ws) = setup();
        let mut node = store.add_node(resource(ws, "/ws/upload/a.wav")).unwrap();
        node.archive_id = Some("hdl:11142/00-A".into());
        node.kind = NodeKind::Info;
        store.update_node(&node).unwrap();

        let found = store.nodes_with_archive_id(ws, "hdl:11142/00-A").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, NodeKind::Info);
    }

    #[test]
    fn test_archive_id_lookup_ignores_case() {
        let (store, ws) = setup();
        let mut node = resource(ws, "/ws/upload/a.wav");
        node.archive_id = Some("hdl:11142/00-ABC".into());
        let node = store.add_node(node).unwrap();

        let found = store.nodes_with_archive_id(ws, "HDL:11142/00-abc").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, node.id);
        assert!(store.nodes_with_archive_id(ws, "hdl:11142/00-ABD").unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_node() {
        let (store, ws) = setup();
        let mut node = store.add_node(resource(ws, "/ws/upload/a.wav")).unwrap();
        node.id = 999;
        assert!(matches!(
            store.update_node(&node),
            Err(IngestError::NodeNotFound(999))
        ));
    }

    #[test]
    fn test_links_are_idempotent() {
        let (store, ws) = setup();
        let parent = store
            .add_node(NewNode::uploaded(ws, "/ws/upload/s.cmdi".into(), NodeKind::Metadata))
            .unwrap();
        let child = store.add_node(resource(ws, "/ws/upload/a.wav")).unwrap();

        assert!(store.add_link(ws, parent.id, child.id).unwrap());
        assert!(!store.add_link(ws, parent.id, child.id).unwrap());

        let parents = store.parents_of(child.id).unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, parent.id);
        assert_eq!(store.children_of(parent.id).unwrap()[0].id, child.id);
        assert_eq!(
            store.links(ws).unwrap(),
            vec![NodeLink {
                parent_id: parent.id,
                child_id: child.id
            }]
        );
    }

    #[test]
    fn test_top_node_url() {
        let (store, ws) = setup();
        assert!(store.top_node_url(ws).unwrap().is_some());
        store.set_top_node_url(ws, None).unwrap();
        assert!(store.top_node_url(ws).unwrap().is_none());
        assert!(matches!(
            store.top_node_url(ws + 100),
            Err(IngestError::WorkspaceNotFound(_))
        ));
    }

    #[test]
    fn test_external_node_urls_persist() {
        let (store, ws) = setup();
        let url = Url::parse("https://example.org/paper.pdf").unwrap();
        let node = store.add_node(NewNode::external(ws, url.clone())).unwrap();
        let loaded = store.get_node(node.id).unwrap().unwrap();
        assert_eq!(loaded.archive_url, Some(url));
        assert!(loaded.working_location.is_none());
    }

    #[test]
    fn test_file_database_persists() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("db").join("workspaces.db");
        let ws = {
            let store = SqliteWorkspaceStore::open(&db).unwrap();
            let ws = store.create_workspace(None).unwrap();
            store.add_node(resource(ws, "/ws/upload/a.wav")).unwrap();
            ws
        };

        let store = SqliteWorkspaceStore::open(&db).unwrap();
        assert_eq!(store.list_nodes(ws).unwrap().len(), 1);
    }
}
