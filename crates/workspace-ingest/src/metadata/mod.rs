//! Metadata document model, persistence and validation.

mod atomic;
mod codec;
mod document;
mod validator;

pub use atomic::{atomic_read_json, atomic_write_json};
pub use codec::{JsonMetadataCodec, MetadataCodec};
pub use document::{DocumentHeader, DocumentKind, MetadataDocument};
pub use validator::{IssueLevel, MetadataValidator, ProfileValidator, ValidationIssue};
