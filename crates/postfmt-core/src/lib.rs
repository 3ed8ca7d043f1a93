#![warn(missing_docs)]
//! Postfmt Core - Postponed Reformatting Engine for Structural Editors
//!
//! # Overview
//!
//! `postfmt-core` solves a sequencing problem of tree-based source editing: automated edits
//! (refactorings, code generation, template expansion) want to insert syntactically correct
//! but unformatted output *now* and have it look right *later*, after the whole mutation
//! batch has settled. Reformatting after every single mutation is quadratic and reformats
//! half-built trees; this engine instead records where formatting will be needed, survives
//! any number of further edits by pinning those places with range markers, and replays the
//! work as one safe, minimal pass when the outermost mutation scope closes.
//!
//! # Core Concepts
//!
//! - **Generated regions**: nodes produced by automated edits are flagged; a formatting pass
//!   free-formats them through the host's [`RangeFormatter`].
//! - **Embedded content**: user-written text moved *into* generated output keeps its shape
//!   and is only shifted sideways (a reindent), never rewritten.
//! - **Range markers**: every pending range is pinned by a marker that follows document
//!   edits, so executing one task cannot corrupt the ranges of the tasks still waiting.
//! - **Normalization**: overlapping requests are merged, split, or dropped into batches of
//!   pairwise-disjoint tasks whose execution order is provably safe.
//!
//! # Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  FormattingSession (scopes, per-doc queues)  │  ← Host API
//! ├──────────────────────────────────────────────┤
//! │  Harvester (tree walk → pending tasks)       │  ← Boundary Detection
//! ├──────────────────────────────────────────────┤
//! │  Scheduler (merge / split / order)           │  ← Normalization
//! ├──────────────────────────────────────────────┤
//! │  Executor (reformat + reindent)              │  ← Document Edits
//! ├──────────────────────────────────────────────┤
//! │  Document + MarkerTable (ropey text)         │  ← Storage
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Running a postponed pass
//!
//! ```rust
//! use postfmt_core::{
//!     FormattingSession, IndentOnlyFormatter, SyntaxTree, TextRange, TreeChangeKind,
//! };
//!
//! // An automated edit wrapped two lines in a generated block: the first line already
//! // carries its new indentation, the second still has the shape of wherever it came from.
//! let text = "start\n    first line\nsecond line\nend\n";
//!
//! let mut tree = SyntaxTree::new(TextRange::new(0, text.chars().count()));
//! let wrapper = tree.add_child(tree.root(), TextRange::new(6, 33));
//! let moved = tree.add_child(wrapper, TextRange::new(10, 33));
//! tree.set_generated(wrapper, true);
//! tree.record_old_indentation(moved, 0);
//!
//! let mut session = FormattingSession::new(IndentOnlyFormatter::default());
//! let doc = session.add_document(text, tree);
//!
//! session
//!     .postpone_formatting_inside(|session| {
//!         session.record_tree_change(doc, wrapper, TreeChangeKind::Added)
//!     })
//!     .unwrap()
//!     .unwrap();
//!
//! // The moved content was shifted to follow its anchor line.
//! assert_eq!(
//!     session.document(doc).unwrap().text(),
//!     "start\n    first line\n    second line\nend\n",
//! );
//! ```
//!
//! ## Using the scheduler directly
//!
//! ```rust
//! use postfmt_core::{Document, PendingAction, PendingSet, TextRange};
//!
//! let mut document = Document::new("fn main() { body }\n");
//! let mut pending = PendingSet::new();
//! pending.insert(&mut document, TextRange::new(0, 11), PendingAction::Reformat);
//! pending.insert(&mut document, TextRange::new(8, 18), PendingAction::Reformat);
//!
//! // Overlapping free-format requests collapse into one task.
//! let batch = pending.normalize(&mut document);
//! assert_eq!(batch.len(), 1);
//! assert_eq!(
//!     document.marker_range(batch[0].marker),
//!     Some(TextRange::new(0, 18)),
//! );
//! ```
//!
//! # Module Description
//!
//! - [`range`] - half-open character ranges
//! - [`marker`] - range markers that survive edits
//! - [`document`] - ropey-backed text plus the marker table
//! - [`tree`] - the arena syntax tree hosts mirror their parse into
//! - [`format`] - the [`RangeFormatter`] seam and indentation options
//! - [`schedule`] - the interval scheduler ([`PendingSet`])
//! - [`harvest`] - tree walks that turn edit residue into pending tasks
//! - [`execute`] - batch execution and the reindent algorithm
//! - [`session`] - the postponement controller ([`FormattingSession`])
//!
//! # Offsets and Threading
//!
//! All offsets are character offsets (ropey chars), never bytes, so multi-byte text shifts
//! markers correctly. The engine is single-threaded by design: one session guards one edit
//! context, and hosts with background mutation serialize on their own tree lock.

pub mod document;
pub mod execute;
pub mod format;
pub mod harvest;
pub mod marker;
pub mod range;
pub mod schedule;
pub mod session;
pub mod tree;

pub use document::{Document, DocumentError};
pub use execute::{execute_batch, reindent};
pub use format::{FormatError, IndentOnlyFormatter, IndentOptions, RangeFormatter};
pub use harvest::{harvest_markers, harvest_touched};
pub use marker::{MarkerId, MarkerTable};
pub use range::TextRange;
pub use schedule::{PendingAction, PendingSet, PendingTask};
pub use session::{DocumentId, FormattingSession, SessionError};
pub use tree::{NodeId, SyntaxTree, TreeChangeKind};
