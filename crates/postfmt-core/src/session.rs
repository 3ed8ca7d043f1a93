//! The postponement controller.
//!
//! A [`FormattingSession`] owns the registered documents, collects the tree changes hosts
//! report while a postponement scope is open, and drives the whole
//! harvest / normalize / execute pipeline when the outermost scope closes. Everything is
//! single-threaded by design; hosts that edit from several threads keep one session per
//! thread or serialize access themselves.

use std::collections::BTreeMap;

use log::{debug, trace, warn};

use crate::document::Document;
use crate::execute::execute_batch;
use crate::format::{FormatError, RangeFormatter};
use crate::harvest::{harvest_markers, harvest_touched};
use crate::schedule::PendingSet;
use crate::tree::{NodeId, SyntaxTree, TreeChangeKind};

/// Opaque identifier of a document registered in a [`FormattingSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Errors returned by session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The document id is not registered in this session.
    DocumentNotFound(DocumentId),
    /// A formatting pass failed; the document's queued work was discarded.
    PassFailed {
        /// The document whose pass failed.
        document: DocumentId,
        /// The failure reported by the formatter.
        error: FormatError,
    },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::DocumentNotFound(id) => {
                write!(f, "document {} is not registered", id.get())
            }
            SessionError::PassFailed { document, error } => {
                write!(
                    f,
                    "postponed formatting of document {} failed: {error}",
                    document.get()
                )
            }
        }
    }
}

impl std::error::Error for SessionError {}

struct DocumentEntry {
    document: Document,
    tree: SyntaxTree,
    queued: Vec<NodeId>,
}

/// The entry point of the engine.
///
/// Hosts wrap every mutation batch in [`FormattingSession::postpone_formatting_inside`] and
/// report each tree change through [`FormattingSession::record_tree_change`]. When the
/// outermost scope closes, every document with queued changes gets one formatting pass:
/// its tree residue is harvested into pending tasks, the tasks are normalized into disjoint
/// batches, and the batches are executed through the session's [`RangeFormatter`].
pub struct FormattingSession<F: RangeFormatter> {
    formatter: F,
    next_document_id: u64,
    documents: BTreeMap<DocumentId, DocumentEntry>,
    postponed_depth: u32,
    disabled_depth: u32,
}

impl<F: RangeFormatter> std::fmt::Debug for FormattingSession<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormattingSession")
            .field("documents", &self.documents.len())
            .field("postponed_depth", &self.postponed_depth)
            .field("disabled_depth", &self.disabled_depth)
            .finish()
    }
}

impl<F: RangeFormatter> FormattingSession<F> {
    /// Create a session dispatching through `formatter`.
    pub fn new(formatter: F) -> Self {
        Self {
            formatter,
            next_document_id: 0,
            documents: BTreeMap::new(),
            postponed_depth: 0,
            disabled_depth: 0,
        }
    }

    /// Register a document and the syntax tree mirroring it.
    pub fn add_document(&mut self, text: &str, tree: SyntaxTree) -> DocumentId {
        let id = DocumentId(self.next_document_id);
        self.next_document_id = self.next_document_id.saturating_add(1);
        self.documents.insert(
            id,
            DocumentEntry {
                document: Document::new(text),
                tree,
                queued: Vec::new(),
            },
        );
        id
    }

    /// Remove a document, discarding any queued work.
    pub fn remove_document(&mut self, id: DocumentId) -> Result<(), SessionError> {
        self.documents
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::DocumentNotFound(id))
    }

    /// Number of registered documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// The document behind `id`.
    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(&id).map(|entry| &entry.document)
    }

    /// Mutable access to the document behind `id`.
    pub fn document_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.get_mut(&id).map(|entry| &mut entry.document)
    }

    /// The syntax tree behind `id`.
    pub fn tree(&self, id: DocumentId) -> Option<&SyntaxTree> {
        self.documents.get(&id).map(|entry| &entry.tree)
    }

    /// Mutable access to the syntax tree behind `id`.
    pub fn tree_mut(&mut self, id: DocumentId) -> Option<&mut SyntaxTree> {
        self.documents.get_mut(&id).map(|entry| &mut entry.tree)
    }

    /// Whether `id` has postponed work queued.
    ///
    /// Hosts treat a locked document as not safe to reformat wholesale: a full-file format
    /// would race the postponed pass over the same ranges.
    pub fn is_locked(&self, id: DocumentId) -> bool {
        self.documents
            .get(&id)
            .is_some_and(|entry| !entry.queued.is_empty())
    }

    /// Report one tree mutation.
    ///
    /// Changes are only collected inside a postponement scope and while recording is not
    /// disabled; anything else is dropped. An in-place content change of a non-generated
    /// node queues its topmost generated descendants instead of the node itself, so a small
    /// automated edit deep in a big file never schedules the whole file.
    pub fn record_tree_change(
        &mut self,
        id: DocumentId,
        node: NodeId,
        kind: TreeChangeKind,
    ) -> Result<(), SessionError> {
        let Some(entry) = self.documents.get_mut(&id) else {
            return Err(SessionError::DocumentNotFound(id));
        };
        if self.disabled_depth > 0 {
            trace!("dropping {kind:?} of {node:?}: recording is disabled");
            return Ok(());
        }
        if self.postponed_depth == 0 {
            debug!("dropping {kind:?} of {node:?}: no postponement scope is open");
            return Ok(());
        }

        match kind {
            TreeChangeKind::Added | TreeChangeKind::Replaced => {
                queue_node(&mut entry.queued, node);
            }
            TreeChangeKind::ContentsChanged => {
                if entry.tree.is_generated(node) {
                    queue_node(&mut entry.queued, node);
                } else {
                    for generated in entry.tree.topmost_generated_descendants(node) {
                        queue_node(&mut entry.queued, generated);
                    }
                }
            }
        }
        Ok(())
    }

    /// Run `op` inside a postponement scope.
    ///
    /// Scopes nest freely; recorded changes accumulate until the outermost scope closes,
    /// which runs one formatting pass per document with queued work, in document-id order.
    /// A document whose text is flagged uncommitted keeps its queue and is retried at the
    /// next close. The first failing document aborts the sweep: its own queue is discarded,
    /// later documents keep theirs, and the failure is returned here.
    pub fn postpone_formatting_inside<R>(
        &mut self,
        op: impl FnOnce(&mut Self) -> R,
    ) -> Result<R, SessionError> {
        self.postponed_depth += 1;
        let value = op(self);
        self.postponed_depth -= 1;
        if self.postponed_depth == 0 {
            self.run_pending_passes()?;
        }
        Ok(value)
    }

    /// Run `op` with change recording and pass execution suppressed.
    ///
    /// Work already queued is retained and handled by a later, non-suppressed close.
    pub fn disable_postprocess_formatting_inside<R>(&mut self, op: impl FnOnce(&mut Self) -> R) -> R {
        self.disabled_depth += 1;
        let value = op(self);
        self.disabled_depth -= 1;
        value
    }

    /// Force the postponed pass of one document without waiting for a scope close.
    ///
    /// Unlike the scope-close sweep this also harvests bare reformat marks when nothing is
    /// queued. It still respects the disable guard and the uncommitted-text deferral.
    pub fn run_postponed_formatting(&mut self, id: DocumentId) -> Result<(), SessionError> {
        if !self.documents.contains_key(&id) {
            return Err(SessionError::DocumentNotFound(id));
        }
        self.run_pass_for(id)
    }

    fn run_pending_passes(&mut self) -> Result<(), SessionError> {
        if self.disabled_depth > 0 {
            debug!("scope closed while formatting is disabled; queues retained");
            return Ok(());
        }
        let ids: Vec<DocumentId> = self
            .documents
            .iter()
            .filter(|(_, entry)| !entry.queued.is_empty())
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.run_pass_for(id)?;
        }
        Ok(())
    }

    fn run_pass_for(&mut self, id: DocumentId) -> Result<(), SessionError> {
        if self.disabled_depth > 0 {
            debug!("formatting is disabled; pass for document {} deferred", id.get());
            return Ok(());
        }

        // The pass edits documents itself; suppress recording so those edits cannot
        // re-queue work and loop forever.
        self.disabled_depth += 1;
        let result = match self.documents.get_mut(&id) {
            Some(entry) => run_document_pass(&self.formatter, entry),
            None => Ok(()),
        };
        self.disabled_depth -= 1;

        result.map_err(|error| {
            warn!(
                "postponed formatting of document {} failed; queued work discarded",
                id.get()
            );
            SessionError::PassFailed {
                document: id,
                error,
            }
        })
    }
}

fn queue_node(queued: &mut Vec<NodeId>, node: NodeId) {
    if !queued.contains(&node) {
        queued.push(node);
    }
}

/// One full pass over a document: harvest the queued nodes and the reformat marks, then
/// alternate normalize / execute rounds until the pending set drains.
fn run_document_pass<F: RangeFormatter>(
    formatter: &F,
    entry: &mut DocumentEntry,
) -> Result<(), FormatError> {
    if entry.document.is_uncommitted() {
        debug!("document text has uncommitted changes; pass deferred");
        return Ok(());
    }

    let touched = std::mem::take(&mut entry.queued);
    let mut pending = PendingSet::new();
    harvest_markers(&mut entry.tree, &mut entry.document, &mut pending);
    harvest_touched(&mut entry.tree, &mut entry.document, &mut pending, &touched);

    while !pending.is_empty() {
        let batch = pending.normalize(&mut entry.document);
        if let Err(error) = execute_batch(formatter, &entry.tree, &mut entry.document, batch) {
            pending.clear(&mut entry.document);
            return Err(error);
        }
    }
    Ok(())
}
