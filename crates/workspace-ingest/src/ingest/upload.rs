//! Storing uploads and turning them into workspace nodes.

use super::naming::{safe_filename, unique_path};
use super::resolver::ReferenceResolver;
use crate::checker::{TypeCheck, TypeChecker};
use crate::config::{IngestConfig, UploadConfig};
use crate::error::{IngestError, Result};
use crate::handle::HandleUtil;
use crate::metadata::{MetadataCodec, MetadataValidator};
use crate::models::{ImportProblem, NewNode, NodeKind, WorkspaceId, WorkspaceNode};
use crate::store::WorkspaceStore;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

/// Result of unpacking an uploaded zip archive.
#[derive(Debug, Default)]
pub struct ZipUpload {
    /// Every file written to the upload directory, in archive order.
    pub stored: Vec<PathBuf>,
    /// Entries that were skipped because they were unsafe or unreadable.
    pub problems: Vec<ImportProblem>,
}

/// Entry point for uploads into a workspace.
///
/// Files are first stored with [`upload_file`](Self::upload_file) or
/// [`upload_zip`](Self::upload_zip), then checked, registered and resolved
/// as one batch with [`process_uploaded_files`](Self::process_uploaded_files).
/// Calls for one workspace must not overlap; see
/// [`WorkspaceTaskQueue`](super::WorkspaceTaskQueue).
pub struct UploadIngestor {
    config: IngestConfig,
    store: Arc<dyn WorkspaceStore>,
    type_checker: Arc<dyn TypeChecker>,
    validator: Arc<dyn MetadataValidator>,
    codec: Arc<dyn MetadataCodec>,
    handles: Arc<dyn HandleUtil>,
    resolver: ReferenceResolver,
}

impl UploadIngestor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        config: IngestConfig,
        store: Arc<dyn WorkspaceStore>,
        type_checker: Arc<dyn TypeChecker>,
        validator: Arc<dyn MetadataValidator>,
        codec: Arc<dyn MetadataCodec>,
        handles: Arc<dyn HandleUtil>,
        resolver: ReferenceResolver,
    ) -> Self {
        Self {
            config,
            store,
            type_checker,
            validator,
            codec,
            handles,
            resolver,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn WorkspaceStore> {
        &self.store
    }

    pub fn handles(&self) -> &Arc<dyn HandleUtil> {
        &self.handles
    }

    /// Write `reader` to a safe, unused name in the workspace upload directory.
    pub fn upload_file(
        &self,
        workspace_id: WorkspaceId,
        mut reader: impl Read,
        filename: &str,
    ) -> Result<PathBuf> {
        let dir = self.config.upload_dir(workspace_id);
        std::fs::create_dir_all(&dir).map_err(|e| IngestError::io_with_path(e, &dir))?;

        let target = unique_path(&dir, &safe_filename(filename))?;
        write_stream(&mut reader, &target)?;

        info!("Stored upload {} for workspace {}", target.display(), workspace_id);
        Ok(target)
    }

    /// Unpack a zip archive into the workspace upload directory.
    ///
    /// Directory structure is kept. Unsafe or unreadable entries are
    /// reported and skipped; only an archive that cannot be opened fails.
    pub fn upload_zip(&self, workspace_id: WorkspaceId, reader: impl Read + Seek) -> Result<ZipUpload> {
        let dir = self.config.upload_dir(workspace_id);
        std::fs::create_dir_all(&dir).map_err(|e| IngestError::io_with_path(e, &dir))?;

        let mut archive = zip::ZipArchive::new(reader).map_err(|e| IngestError::Zip {
            message: format!("Invalid zip archive: {}", e),
            source: Some(e),
        })?;

        let mut upload = ZipUpload::default();

        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable zip entry {}: {}", i, e);
                    upload.problems.push(ImportProblem::file_with_cause(
                        format!("#{}", i),
                        "Zip entry could not be read",
                        e,
                    ));
                    continue;
                }
            };

            let name = entry.name().to_string();
            if is_ignored_entry(&name) {
                debug!("Ignoring zip entry {}", name);
                continue;
            }

            let Some(relative) = entry.enclosed_name() else {
                warn!("Skipping unsafe zip entry {}", name);
                upload.problems.push(ImportProblem::file_with_cause(
                    &name,
                    "Zip entry escapes the upload directory",
                    IngestError::UnsafeEntryName { name: name.clone() },
                ));
                continue;
            };

            if entry.is_dir() {
                let outdir = dir.join(&relative);
                if let Err(e) = std::fs::create_dir_all(&outdir) {
                    upload.problems.push(ImportProblem::file_with_cause(
                        &outdir,
                        "Could not create directory",
                        IngestError::io_with_path(e, &outdir),
                    ));
                }
                continue;
            }

            let parent = match relative.parent() {
                Some(parent) => dir.join(parent),
                None => dir.clone(),
            };
            let filename = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let stored = std::fs::create_dir_all(&parent)
                .map_err(|e| IngestError::io_with_path(e, &parent))
                .and_then(|()| unique_path(&parent, &safe_filename(&filename)))
                .and_then(|target| write_stream(&mut entry, &target).map(|()| target));

            match stored {
                Ok(target) => {
                    debug!("Extracted {} to {}", name, target.display());
                    upload.stored.push(target);
                }
                Err(e) => {
                    warn!("Failed to extract zip entry {}: {}", name, e);
                    upload.problems.push(ImportProblem::file_with_cause(
                        &name,
                        "Zip entry could not be stored",
                        e,
                    ));
                }
            }
        }

        info!(
            "Extracted {} files for workspace {} ({} entries skipped)",
            upload.stored.len(),
            workspace_id,
            upload.problems.len()
        );
        Ok(upload)
    }

    /// Check, register and resolve a batch of stored files.
    ///
    /// Per-file failures become problems and the batch continues. `Err` is
    /// returned only when the workspace itself cannot be read.
    pub fn process_uploaded_files(
        &self,
        workspace_id: WorkspaceId,
        files: &[PathBuf],
    ) -> Result<Vec<ImportProblem>> {
        info!(
            "Processing {} uploaded files for workspace {}",
            files.len(),
            workspace_id
        );

        let mut problems = Vec::new();
        let mut accepted = Vec::new();

        for file in files {
            let top_location = self.store.top_node_url(workspace_id)?;

            let check = match self.check_file(file, top_location.as_ref()) {
                Ok(check) => check,
                Err(problem) => {
                    self.reject(file, &problem);
                    problems.push(problem);
                    continue;
                }
            };

            match self.register(workspace_id, file, &check) {
                Ok(node) => {
                    debug!("Registered {} as node {}", file.display(), node.id);
                    accepted.push(node);
                }
                Err(problem) => problems.push(problem),
            }
        }

        problems.extend(self.resolver.resolve_all(workspace_id, &accepted));

        info!(
            "Workspace {}: {} files accepted, {} problems",
            workspace_id,
            accepted.len(),
            problems.len()
        );
        Ok(problems)
    }

    /// Files under the workspace upload directory, sorted.
    ///
    /// Lets a caller re-run [`process_uploaded_files`](Self::process_uploaded_files)
    /// on files stored before an interruption.
    pub fn pending_uploads(&self, workspace_id: WorkspaceId) -> Result<Vec<PathBuf>> {
        let dir = self.config.upload_dir(workspace_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Type, archivability and validity checks for one file.
    fn check_file(
        &self,
        file: &Path,
        top_location: Option<&Url>,
    ) -> std::result::Result<TypeCheck, ImportProblem> {
        let check = self.type_checker.check(file).map_err(|e| {
            ImportProblem::file_with_cause(file, "File type could not be determined", e)
        })?;

        let archivability = self.type_checker.is_archivable(&check, top_location);
        if !archivability.archivable {
            return Err(ImportProblem::file(file, archivability.message));
        }

        if self.config.is_metadata_type(&check.media_type) {
            self.check_metadata(file)?;
        }

        Ok(check)
    }

    fn check_metadata(&self, file: &Path) -> std::result::Result<(), ImportProblem> {
        match self.validator.is_schema_valid(file) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ImportProblem::file(file, "Metadata document is not schema-valid"));
            }
            Err(e) => {
                return Err(ImportProblem::file_with_cause(
                    file,
                    "Metadata document could not be validated",
                    e,
                ));
            }
        }

        let issues = self.validator.validate_content(file).map_err(|e| {
            ImportProblem::file_with_cause(file, "Metadata document could not be validated", e)
        })?;

        let errors: Vec<&str> = issues
            .iter()
            .filter(|issue| issue.is_error())
            .map(|issue| issue.message.as_str())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ImportProblem::file(file, errors.join("; ")))
        }
    }

    fn register(
        &self,
        workspace_id: WorkspaceId,
        file: &Path,
        check: &TypeCheck,
    ) -> std::result::Result<WorkspaceNode, ImportProblem> {
        let is_metadata = self.config.is_metadata_type(&check.media_type);
        let kind = if is_metadata {
            NodeKind::Metadata
        } else {
            NodeKind::Resource
        };

        let mut node = NewNode::uploaded(workspace_id, file.to_path_buf(), kind);
        node.media_type = Some(check.media_type.clone());

        if is_metadata {
            match self.codec.parse(file) {
                Ok(doc) => {
                    node.archive_id = doc.self_handle().map(|handle| {
                        self.handles
                            .canonicalize(handle)
                            .unwrap_or_else(|_| handle.to_string())
                    });
                }
                Err(e) => warn!("Could not read self-handle from {}: {}", file.display(), e),
            }
            if self.config.is_orphan(file) {
                node.origin_url = Url::from_file_path(file).ok();
            }
        }

        self.store.add_node(node).map_err(|e| {
            ImportProblem::file_with_cause(file, "Could not register workspace node", e)
        })
    }

    /// Delete a rejected file unless it is in the orphans area.
    fn reject(&self, file: &Path, problem: &ImportProblem) {
        warn!("Rejected {}: {}", file.display(), problem.message());
        if self.config.is_orphan(file) {
            return;
        }
        if let Err(e) = std::fs::remove_file(file) {
            warn!("Failed to delete rejected file {}: {}", file.display(), e);
        }
    }
}

/// Whether a zip entry is packaging noise rather than content.
fn is_ignored_entry(name: &str) -> bool {
    if UploadConfig::IGNORED_ZIP_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
    {
        return true;
    }
    let base = name.rsplit('/').next().unwrap_or(name);
    UploadConfig::IGNORED_ZIP_NAMES.contains(&base)
}

/// Copy `reader` into a new file at `target`, removing it on failure.
fn write_stream(reader: &mut impl Read, target: &Path) -> Result<()> {
    let mut file = File::create(target).map_err(|e| IngestError::io_with_path(e, target))?;
    if let Err(e) = std::io::copy(reader, &mut file) {
        drop(file);
        let _ = std::fs::remove_file(target);
        return Err(IngestError::io_with_path(e, target));
    }
    Ok(())
}
