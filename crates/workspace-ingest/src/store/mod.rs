//! Persistence of workspace nodes and links.
//!
//! The engine only depends on [`WorkspaceStore`]; [`SqliteWorkspaceStore`]
//! is the bundled implementation.

mod sqlite;
mod traits;

pub use sqlite::SqliteWorkspaceStore;
pub use traits::WorkspaceStore;
