//! Workspace Ingest - upload ingestion and metadata reference resolution for
//! archive editing workspaces.
//!
//! A workspace is a working copy of an archive subtree. Uploaded files are
//! type-checked, validated and registered as workspace nodes; the references
//! inside uploaded metadata documents are then resolved to nodes (by path,
//! by handle, or as external links), turned into parent/child links, and
//! rewritten in place.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use workspace_ingest::{IngestConfig, SqliteWorkspaceStore, UploadIngestorBuilder};
//!
//! let config = IngestConfig::with_base_dir("/srv/ingest");
//! let store = Arc::new(SqliteWorkspaceStore::open("/srv/ingest/workspaces.db")?);
//! let workspace = store.create_workspace(Some(&top_node_url))?;
//!
//! let ingestor = UploadIngestorBuilder::new(config, store).build()?;
//! let upload = ingestor.upload_zip(workspace, std::fs::File::open("corpus.zip")?)?;
//! let problems = ingestor.process_uploaded_files(workspace, &upload.stored)?;
//! for problem in upload.problems.iter().chain(&problems) {
//!     println!("{}", problem);
//! }
//! ```

pub mod archive;
pub mod checker;
pub mod config;
pub mod error;
pub mod handle;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use archive::{ArchiveDirectory, ArchiveNode, InMemoryArchive};
pub use checker::{Archivability, SniffingTypeChecker, TypeCheck, TypeChecker};
pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use handle::{Handle, HandleRules, HandleUtil};
pub use ingest::{
    ReferenceResolver, UploadIngestor, UploadIngestorBuilder, WorkspaceTaskQueue, ZipUpload,
};
pub use metadata::{
    JsonMetadataCodec, MetadataCodec, MetadataDocument, MetadataValidator, ProfileValidator,
    ValidationIssue,
};
pub use models::{
    ImportProblem, NewNode, NodeId, NodeKind, NodeLink, NodeStatus, Reference, ReferenceType,
    WorkspaceId, WorkspaceNode,
};
pub use store::{SqliteWorkspaceStore, WorkspaceStore};
