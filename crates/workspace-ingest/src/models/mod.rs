//! Data types shared across the ingestion engine.

mod node;
mod problem;
mod reference;

pub use node::{NewNode, NodeId, NodeKind, NodeLink, NodeStatus, WorkspaceId, WorkspaceNode};
pub use problem::ImportProblem;
pub use reference::{Reference, ReferenceShape, ReferenceType};
