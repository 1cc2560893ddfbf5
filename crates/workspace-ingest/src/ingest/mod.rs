//! Upload ingestion and reference resolution.
//!
//! [`UploadIngestor`] stores uploads and registers them as workspace nodes;
//! [`ReferenceResolver`] then matches the references of every uploaded
//! metadata document to nodes, links them and rewrites the documents.

mod builder;
mod linker;
mod matcher;
mod naming;
mod queue;
mod resolver;
mod rewriter;
mod upload;

pub use builder::UploadIngestorBuilder;
pub use linker::LinkEstablisher;
pub use matcher::NodeMatcher;
pub use naming::{safe_filename, unique_path};
pub use queue::WorkspaceTaskQueue;
pub use resolver::ReferenceResolver;
pub use rewriter::DocumentRewriter;
pub use upload::{UploadIngestor, ZipUpload};
