//! Builder for assembling an [`UploadIngestor`].

use super::matcher::NodeMatcher;
use super::resolver::ReferenceResolver;
use super::upload::UploadIngestor;
use crate::archive::{ArchiveDirectory, InMemoryArchive};
use crate::checker::{SniffingTypeChecker, TypeChecker};
use crate::config::IngestConfig;
use crate::error::Result;
use crate::handle::{HandleRules, HandleUtil};
use crate::metadata::{JsonMetadataCodec, MetadataCodec, MetadataValidator, ProfileValidator};
use crate::store::WorkspaceStore;
use std::sync::Arc;
use tracing::debug;

/// Builder for configuring an [`UploadIngestor`].
///
/// Every collaborator has a default derived from the configuration; any of
/// them can be replaced before [`build`](Self::build).
///
/// # Example
///
/// ```rust,ignore
/// use workspace_ingest::{IngestConfig, SqliteWorkspaceStore, UploadIngestorBuilder};
///
/// let store = Arc::new(SqliteWorkspaceStore::open("./data/workspaces.db")?);
/// let ingestor = UploadIngestorBuilder::new(IngestConfig::load("ingest.json")?, store)
///     .with_archive(Arc::new(my_archive))
///     .build()?;
/// ```
pub struct UploadIngestorBuilder {
    config: IngestConfig,
    store: Arc<dyn WorkspaceStore>,
    type_checker: Option<Arc<dyn TypeChecker>>,
    validator: Option<Arc<dyn MetadataValidator>>,
    codec: Option<Arc<dyn MetadataCodec>>,
    handles: Option<Arc<dyn HandleUtil>>,
    archive: Option<Arc<dyn ArchiveDirectory>>,
}

impl UploadIngestorBuilder {
    pub fn new(config: IngestConfig, store: Arc<dyn WorkspaceStore>) -> Self {
        Self {
            config,
            store,
            type_checker: None,
            validator: None,
            codec: None,
            handles: None,
            archive: None,
        }
    }

    /// Default: [`SniffingTypeChecker`] over the configured media types.
    pub fn with_type_checker(mut self, type_checker: Arc<dyn TypeChecker>) -> Self {
        self.type_checker = Some(type_checker);
        self
    }

    /// Default: [`ProfileValidator`] using the builder's codec and handle rules.
    pub fn with_validator(mut self, validator: Arc<dyn MetadataValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Default: [`JsonMetadataCodec`].
    pub fn with_codec(mut self, codec: Arc<dyn MetadataCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Default: [`HandleRules`] with the configured known prefixes.
    pub fn with_handles(mut self, handles: Arc<dyn HandleUtil>) -> Self {
        self.handles = Some(handles);
        self
    }

    /// Default: an empty [`InMemoryArchive`].
    pub fn with_archive(mut self, archive: Arc<dyn ArchiveDirectory>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Validate the configuration and wire the collaborators together.
    pub fn build(self) -> Result<UploadIngestor> {
        self.config.validate()?;

        let handles = self.handles.unwrap_or_else(|| {
            Arc::new(HandleRules::new(self.config.known_handle_prefixes.clone()))
        });
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(JsonMetadataCodec));
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(ProfileValidator::new(codec.clone(), handles.clone())));
        let type_checker = self
            .type_checker
            .unwrap_or_else(|| Arc::new(SniffingTypeChecker::new(&self.config)));
        let archive = self
            .archive
            .unwrap_or_else(|| Arc::new(InMemoryArchive::new()));

        let matcher = NodeMatcher::new(self.store.clone(), handles.clone(), archive);
        let resolver = ReferenceResolver::new(codec.clone(), handles.clone(), self.store.clone(), matcher);

        debug!(
            "Built upload ingestor rooted at {}",
            self.config.workspaces_root.display()
        );

        Ok(UploadIngestor::from_parts(
            self.config,
            self.store,
            type_checker,
            validator,
            codec,
            handles,
            resolver,
        ))
    }
}
