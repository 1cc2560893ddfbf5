//! Problems collected while ingesting a batch.

use super::node::WorkspaceNode;
use super::reference::Reference;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A recoverable failure recorded during ingestion.
///
/// Problems never stop the batch; they are returned to the caller for
/// reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportProblem {
    /// An uploaded file was rejected or could not be stored.
    File {
        file: PathBuf,
        message: String,
        cause: Option<String>,
    },
    /// A link between two nodes could not be created.
    Link {
        parent: WorkspaceNode,
        child: WorkspaceNode,
        message: String,
        cause: Option<String>,
    },
    /// A reference could not be matched to any node.
    Match {
        parent: WorkspaceNode,
        reference: Reference,
        message: String,
        cause: Option<String>,
    },
}

impl ImportProblem {
    pub fn file(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ImportProblem::File {
            file: file.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn file_with_cause(
        file: impl Into<PathBuf>,
        message: impl Into<String>,
        cause: impl fmt::Display,
    ) -> Self {
        ImportProblem::File {
            file: file.into(),
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ImportProblem::File { message, .. }
            | ImportProblem::Link { message, .. }
            | ImportProblem::Match { message, .. } => message,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ImportProblem::File { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self, ImportProblem::Link { .. })
    }

    pub fn is_match(&self) -> bool {
        matches!(self, ImportProblem::Match { .. })
    }
}

impl fmt::Display for ImportProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportProblem::File { file, message, .. } => {
                write!(f, "{}: {}", file.display(), message)?;
            }
            ImportProblem::Link {
                parent,
                child,
                message,
                ..
            } => {
                write!(
                    f,
                    "link {} ({}) -> {} ({}): {}",
                    parent.name, parent.id, child.name, child.id, message
                )?;
            }
            ImportProblem::Match {
                parent,
                reference,
                message,
                ..
            } => {
                write!(
                    f,
                    "{} ({}) reference {}: {}",
                    parent.name,
                    parent.id,
                    reference.describe(),
                    message
                )?;
            }
        }
        let cause = match self {
            ImportProblem::File { cause, .. }
            | ImportProblem::Link { cause, .. }
            | ImportProblem::Match { cause, .. } => cause,
        };
        if let Some(cause) = cause {
            write!(f, " ({})", cause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_problem_display() {
        let p = ImportProblem::file_with_cause("/up/a.exe", "Unrecognised file type", "no match");
        assert_eq!(p.to_string(), "/up/a.exe: Unrecognised file type (no match)");
        assert!(p.is_file());
    }

    #[test]
    fn test_serialized_tag() {
        let p = ImportProblem::file("/up/a.exe", "rejected");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(json["message"], "rejected");
    }
}
