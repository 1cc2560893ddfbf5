//! Resolution of metadata references to workspace nodes.
//!
//! Every reference of every uploaded metadata document is matched to a
//! node, linked as a child of the document's node, and rewritten to point
//! at the node's canonical location. Unmatched references are removed from
//! their documents and reported.

use super::linker::LinkEstablisher;
use super::matcher::NodeMatcher;
use super::rewriter::DocumentRewriter;
use crate::error::Result;
use crate::handle::HandleUtil;
use crate::metadata::{MetadataCodec, MetadataDocument};
use crate::models::{
    ImportProblem, NodeId, NodeKind, Reference, ReferenceShape, WorkspaceId, WorkspaceNode,
};
use crate::store::WorkspaceStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Ways of finding the node behind a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchStrategy {
    /// The location token against the batch.
    ByPath,
    /// A handle-shaped URI against batch, workspace and archive.
    ByHandle,
    /// A non-handle URI treated as a path against the batch.
    PathAsUri,
    /// A non-local URL, proxied handles included, as an external node.
    External,
}

/// How a reference spells its URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UriForm {
    Absent,
    /// Neither handle nor anything else the handle rules recognise.
    Plain,
    /// A handle behind the `hdl.handle.net` proxy; also a web URL.
    ProxiedHandle,
    /// `hdl:PREFIX/SUFFIX`, resolvable only through the handle system.
    BareHandle,
}

impl UriForm {
    fn of(uri: Option<&str>, handles: &dyn HandleUtil) -> Self {
        match uri {
            None => UriForm::Absent,
            Some(uri) if !handles.is_handle_shaped(uri) => UriForm::Plain,
            Some(uri) => match Url::parse(uri.trim()) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => UriForm::ProxiedHandle,
                _ => UriForm::BareHandle,
            },
        }
    }

    fn is_handle(self) -> bool {
        matches!(self, UriForm::ProxiedHandle | UriForm::BareHandle)
    }
}

/// Strategies in the order they are tried; the first match wins.
const STRATEGIES: [MatchStrategy; 4] = [
    MatchStrategy::ByPath,
    MatchStrategy::ByHandle,
    MatchStrategy::PathAsUri,
    MatchStrategy::External,
];

impl MatchStrategy {
    fn applies(self, shape: ReferenceShape<'_>, uri: UriForm) -> bool {
        match self {
            MatchStrategy::ByPath => shape.location().is_some(),
            MatchStrategy::ByHandle => uri.is_handle(),
            MatchStrategy::PathAsUri => uri == UriForm::Plain,
            MatchStrategy::External => matches!(uri, UriForm::Plain | UriForm::ProxiedHandle),
        }
    }
}

/// A matched node and whether it lies outside the archive.
struct Resolution {
    node: WorkspaceNode,
    external: bool,
}

/// A document whose foreign self-handle is removed once the pass is over.
struct PendingHandleStrip {
    document: MetadataDocument,
    node_id: NodeId,
}

pub struct ReferenceResolver {
    codec: Arc<dyn MetadataCodec>,
    handles: Arc<dyn HandleUtil>,
    store: Arc<dyn WorkspaceStore>,
    matcher: NodeMatcher,
    linker: LinkEstablisher,
    rewriter: DocumentRewriter,
}

impl ReferenceResolver {
    pub fn new(
        codec: Arc<dyn MetadataCodec>,
        handles: Arc<dyn HandleUtil>,
        store: Arc<dyn WorkspaceStore>,
        matcher: NodeMatcher,
    ) -> Self {
        Self {
            linker: LinkEstablisher::new(store.clone(), handles.clone()),
            rewriter: DocumentRewriter::new(codec.clone()),
            codec,
            handles,
            store,
            matcher,
        }
    }

    /// Resolve the references of every metadata node in `candidates`.
    ///
    /// `candidates` is also the batch pool that path and handle matching
    /// search first.
    pub fn resolve_all(
        &self,
        workspace_id: WorkspaceId,
        candidates: &[WorkspaceNode],
    ) -> Vec<ImportProblem> {
        let mut pool = candidates.to_vec();
        let mut problems = Vec::new();
        let mut pending_strips = Vec::new();

        info!(
            "Resolving references for {} uploaded nodes in workspace {}",
            pool.len(),
            workspace_id
        );

        for index in 0..pool.len() {
            let node = pool[index].clone();
            if !node.is_metadata() {
                continue;
            }
            let Some(location) = node.working_location.clone() else {
                continue;
            };

            let mut doc = match self.codec.parse(&location) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping node {}: could not parse {}: {}", node.id, location.display(), e);
                    continue;
                }
            };

            if !doc.is_referencing() {
                debug!("Node {} is not a referencing document", node.id);
                continue;
            }

            let foreign_self_handle = doc
                .self_handle()
                .is_some_and(|h| self.handles.is_handle_shaped(h) && !self.handles.is_known_prefix(h));

            self.resolve_document(workspace_id, &node, &mut doc, &mut pool, &mut problems);

            if foreign_self_handle {
                pending_strips.push(PendingHandleStrip {
                    document: doc,
                    node_id: node.id,
                });
            }
        }

        for mut pending in pending_strips {
            self.strip_foreign_self_handle(&mut pending, &mut pool);
        }

        info!(
            "Reference resolution for workspace {} finished with {} problems",
            workspace_id,
            problems.len()
        );
        problems
    }

    fn resolve_document(
        &self,
        workspace_id: WorkspaceId,
        parent: &WorkspaceNode,
        doc: &mut MetadataDocument,
        pool: &mut [WorkspaceNode],
        problems: &mut Vec<ImportProblem>,
    ) {
        let references: Vec<Reference> = doc.references.clone();

        for reference in references.iter().filter(|r| !r.is_page()) {
            match self.resolve_reference(workspace_id, parent, doc, reference, pool) {
                Ok(Some(resolution)) => {
                    self.attach(parent, doc, reference, resolution, pool, problems);
                }
                Ok(None) => {
                    debug!("No node for reference {} of node {}", reference.id, parent.id);
                    if let Err(e) = self.rewriter.remove_reference(doc, &reference.id) {
                        warn!("Failed to save {} for node {}: {}", doc.location().display(), parent.id, e);
                    }
                    problems.push(ImportProblem::Match {
                        parent: parent.clone(),
                        reference: reference.clone(),
                        message: "No matching node found; reference removed".to_string(),
                        cause: None,
                    });
                }
                Err(e) if e.is_internal_consistency() => {
                    error!("Aborting resolution of node {}: {}", parent.id, e);
                    problems.push(ImportProblem::Match {
                        parent: parent.clone(),
                        reference: reference.clone(),
                        message: "Workspace is inconsistent; resolution of this document aborted"
                            .to_string(),
                        cause: Some(e.to_string()),
                    });
                    return;
                }
                Err(e) => {
                    warn!("Failed to resolve reference {} of node {}: {}", reference.id, parent.id, e);
                    problems.push(ImportProblem::Match {
                        parent: parent.clone(),
                        reference: reference.clone(),
                        message: "Reference could not be resolved".to_string(),
                        cause: Some(e.to_string()),
                    });
                }
            }
        }
    }

    fn resolve_reference(
        &self,
        workspace_id: WorkspaceId,
        parent: &WorkspaceNode,
        doc: &mut MetadataDocument,
        reference: &Reference,
        pool: &mut [WorkspaceNode],
    ) -> Result<Option<Resolution>> {
        let shape = reference.shape();
        let uri_form = UriForm::of(shape.uri(), self.handles.as_ref());

        for strategy in STRATEGIES {
            if !strategy.applies(shape, uri_form) {
                continue;
            }

            let found = match (strategy, shape.location(), shape.uri()) {
                (MatchStrategy::ByPath, Some(location), uri) => {
                    self.match_by_path(parent, doc, reference, location, uri, pool)
                }
                (MatchStrategy::ByHandle, _, Some(uri)) => {
                    self.match_by_handle(workspace_id, parent, doc, reference, uri, pool)?
                }
                (MatchStrategy::PathAsUri, _, Some(uri)) => {
                    self.match_path_as_uri(parent, doc, reference, uri, pool)
                }
                (MatchStrategy::External, _, Some(uri)) => {
                    self.match_external(workspace_id, uri, uri_form, pool)?
                }
                _ => None,
            };

            if let Some(resolution) = found {
                debug!(
                    "Reference {} of node {} matched node {} via {:?}",
                    reference.id, parent.id, resolution.node.id, strategy
                );
                return Ok(Some(resolution));
            }
        }

        Ok(None)
    }

    /// Location token against the batch. A known-prefix handle on the
    /// reference is adopted by the node; any other URI is dropped from the
    /// document.
    fn match_by_path(
        &self,
        parent: &WorkspaceNode,
        doc: &mut MetadataDocument,
        reference: &Reference,
        location: &str,
        uri: Option<&str>,
        pool: &mut [WorkspaceNode],
    ) -> Option<Resolution> {
        let mut node = self.matcher.by_path(pool, location)?;

        if let Some(uri) = uri {
            match self.archive_handle(uri) {
                Some(canonical) => {
                    if node.archive_id.as_deref() != Some(canonical.as_str()) {
                        node.archive_id = Some(canonical);
                        self.persist_node(&node, pool);
                    }
                }
                None => self.clear_uri(parent, doc, reference),
            }
        }

        Some(Resolution {
            node,
            external: false,
        })
    }

    /// Handle against batch, workspace and archive. The reference location
    /// is pointed at the node's working copy and the node adopts the handle
    /// if it carries a different one.
    fn match_by_handle(
        &self,
        workspace_id: WorkspaceId,
        parent: &WorkspaceNode,
        doc: &mut MetadataDocument,
        reference: &Reference,
        uri: &str,
        pool: &mut [WorkspaceNode],
    ) -> Result<Option<Resolution>> {
        let Some(mut node) = self.matcher.by_handle(workspace_id, pool, uri)? else {
            return Ok(None);
        };

        self.point_location_at(parent, doc, reference, &node);

        let equivalent = node
            .archive_id
            .as_deref()
            .is_some_and(|id| self.handles.equivalent(id, uri).unwrap_or(false));
        if !equivalent {
            node.archive_id = Some(
                self.handles
                    .canonicalize(uri)
                    .unwrap_or_else(|_| uri.trim().to_string()),
            );
            self.persist_node(&node, pool);
        }

        let external = node.is_external(self.handles.as_ref());
        Ok(Some(Resolution { node, external }))
    }

    /// Wrap a URL in a new external node. A proxied handle is kept as the
    /// node's identifier so later references to it find the same node.
    fn match_external(
        &self,
        workspace_id: WorkspaceId,
        uri: &str,
        uri_form: UriForm,
        pool: &mut [WorkspaceNode],
    ) -> Result<Option<Resolution>> {
        let Some(mut node) = self.matcher.external(workspace_id, uri)? else {
            return Ok(None);
        };

        if uri_form == UriForm::ProxiedHandle {
            if let Ok(canonical) = self.handles.canonicalize(uri) {
                node.archive_id = Some(canonical);
                self.persist_node(&node, pool);
            }
        }

        Ok(Some(Resolution {
            node,
            external: true,
        }))
    }

    fn match_path_as_uri(
        &self,
        parent: &WorkspaceNode,
        doc: &mut MetadataDocument,
        reference: &Reference,
        uri: &str,
        pool: &mut [WorkspaceNode],
    ) -> Option<Resolution> {
        let node = self.matcher.by_path(pool, uri)?;
        self.point_location_at(parent, doc, reference, &node);
        Some(Resolution {
            node,
            external: false,
        })
    }

    /// Link a matched node and apply the follow-up rewrites.
    fn attach(
        &self,
        parent: &WorkspaceNode,
        doc: &mut MetadataDocument,
        reference: &Reference,
        resolution: Resolution,
        pool: &mut [WorkspaceNode],
        problems: &mut Vec<ImportProblem>,
    ) {
        let mut node = resolution.node;

        if let Err(problem) = self.linker.link(parent, &node) {
            problems.push(problem);
        }

        let external = resolution.external || node.is_external(self.handles.as_ref());
        if !external {
            if let Some(uri) = reference.shape().uri() {
                if self.handles.is_handle_shaped(uri) && !self.handles.is_known_prefix(uri) {
                    self.clear_uri(parent, doc, reference);
                }
            }
        }

        if reference.is_info() && node.kind != NodeKind::Info {
            node.kind = NodeKind::Info;
            self.persist_node(&node, pool);
        }
    }

    fn strip_foreign_self_handle(&self, pending: &mut PendingHandleStrip, pool: &mut [WorkspaceNode]) {
        if let Err(e) = self.rewriter.strip_self_handle(&mut pending.document) {
            warn!(
                "Failed to strip self-handle from {} for node {}: {}",
                pending.document.location().display(),
                pending.node_id,
                e
            );
        }

        let Some(mut node) = pool.iter().find(|n| n.id == pending.node_id).cloned() else {
            return;
        };
        let foreign = node
            .archive_id
            .as_deref()
            .is_some_and(|id| !self.handles.is_known_prefix(id));
        if foreign {
            node.archive_id = None;
            self.persist_node(&node, pool);
        }
    }

    /// Canonical form of `uri` if it is a handle of this archive.
    fn archive_handle(&self, uri: &str) -> Option<String> {
        if !self.handles.is_handle_shaped(uri) || !self.handles.is_known_prefix(uri) {
            return None;
        }
        self.handles.canonicalize(uri).ok()
    }

    fn point_location_at(
        &self,
        parent: &WorkspaceNode,
        doc: &mut MetadataDocument,
        reference: &Reference,
        node: &WorkspaceNode,
    ) {
        let Some(target) = node.working_location.as_deref() else {
            return;
        };
        let Some(location) = relative_location(doc.location(), target) else {
            debug!("No relative location from {} to {}", doc.location().display(), target.display());
            return;
        };
        if let Err(e) = self.rewriter.rewrite_location(doc, &reference.id, &location) {
            warn!("Failed to save {} for node {}: {}", doc.location().display(), parent.id, e);
        }
    }

    fn clear_uri(&self, parent: &WorkspaceNode, doc: &mut MetadataDocument, reference: &Reference) {
        if let Err(e) = self.rewriter.clear_reference_uri(doc, &reference.id) {
            warn!("Failed to save {} for node {}: {}", doc.location().display(), parent.id, e);
        }
    }

    /// Store `node` and mirror the change into the batch pool.
    fn persist_node(&self, node: &WorkspaceNode, pool: &mut [WorkspaceNode]) {
        if let Err(e) = self.store.update_node(node) {
            warn!("Failed to update node {}: {}", node.id, e);
            return;
        }
        if let Some(slot) = pool.iter_mut().find(|n| n.id == node.id) {
            *slot = node.clone();
        }
    }
}

/// Path of `target` relative to the directory holding `document`.
pub(crate) fn relative_location(document: &Path, target: &Path) -> Option<String> {
    let base = Url::from_file_path(document).ok()?;
    let target = Url::from_file_path(target).ok()?;
    let relative = base.make_relative(&target)?;
    urlencoding::decode(&relative)
        .ok()
        .map(|decoded| decoded.into_owned())
}
