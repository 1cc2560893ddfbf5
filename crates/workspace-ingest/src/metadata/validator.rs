//! Metadata validity checks.

use super::codec::MetadataCodec;
use crate::error::Result;
use crate::handle::HandleUtil;
use crate::models::ReferenceShape;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Severity of a content issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Warning,
    Error,
}

/// One finding of a content check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == IssueLevel::Error
    }
}

/// Validates uploaded metadata documents.
pub trait MetadataValidator: Send + Sync {
    /// Whether the file conforms to its schema.
    fn is_schema_valid(&self, file: &Path) -> Result<bool>;

    /// Content-level findings. Only error-level issues reject a file.
    fn validate_content(&self, file: &Path) -> Result<Vec<ValidationIssue>>;
}

/// Structural checks on top of a [`MetadataCodec`].
///
/// A document is schema-valid when it parses and declares a profile,
/// restricted to `allowed_profiles` when that list is non-empty.
pub struct ProfileValidator {
    codec: Arc<dyn MetadataCodec>,
    handles: Arc<dyn HandleUtil>,
    allowed_profiles: Vec<String>,
}

impl ProfileValidator {
    pub fn new(codec: Arc<dyn MetadataCodec>, handles: Arc<dyn HandleUtil>) -> Self {
        Self {
            codec,
            handles,
            allowed_profiles: Vec::new(),
        }
    }

    pub fn with_allowed_profiles(mut self, profiles: impl IntoIterator<Item = String>) -> Self {
        self.allowed_profiles = profiles.into_iter().collect();
        self
    }
}

impl MetadataValidator for ProfileValidator {
    fn is_schema_valid(&self, file: &Path) -> Result<bool> {
        let doc = match self.codec.parse(file) {
            Ok(doc) => doc,
            Err(e) => {
                debug!("Schema check failed to parse {}: {}", file.display(), e);
                return Ok(false);
            }
        };

        let profile = doc
            .header
            .profile
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        Ok(match profile {
            None => false,
            Some(_) if self.allowed_profiles.is_empty() => true,
            Some(p) => self.allowed_profiles.iter().any(|allowed| allowed == p),
        })
    }

    fn validate_content(&self, file: &Path) -> Result<Vec<ValidationIssue>> {
        let doc = self.codec.parse(file)?;
        let mut issues = Vec::new();

        if let Some(handle) = doc.self_handle() {
            if !self.handles.is_handle_shaped(handle) {
                issues.push(ValidationIssue::error(format!(
                    "Self-handle '{}' is not a valid handle",
                    handle
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for reference in &doc.references {
            if !seen.insert(reference.id.as_str()) {
                issues.push(ValidationIssue::error(format!(
                    "Duplicate reference id '{}'",
                    reference.id
                )));
            }
            if reference.shape() == ReferenceShape::Neither {
                issues.push(ValidationIssue::warning(format!(
                    "Reference '{}' has neither a location nor a URI",
                    reference.id
                )));
            }
        }

        Ok(issues)
    }
}
