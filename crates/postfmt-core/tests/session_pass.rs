//! Controller validation: postponement scopes, recording suppression, uncommitted-text
//! deferral, failure handling, and multi-document passes.

use std::cell::RefCell;
use std::rc::Rc;

use postfmt_core::{
    Document, FormatError, FormattingSession, IndentOnlyFormatter, IndentOptions,
    RangeFormatter, SessionError, SyntaxTree, TextRange, TreeChangeKind,
};

type Calls = Rc<RefCell<Vec<(usize, usize, bool)>>>;

/// Records reformat dispatches without editing anything.
struct RecordingFormatter {
    calls: Calls,
}

impl RecordingFormatter {
    fn new() -> (Self, Calls) {
        let calls = Calls::default();
        (
            Self {
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl RangeFormatter for RecordingFormatter {
    fn reformat(
        &self,
        _tree: &SyntaxTree,
        _document: &mut Document,
        range: TextRange,
        include_leading_whitespace: bool,
    ) -> Result<(), FormatError> {
        self.calls
            .borrow_mut()
            .push((range.start, range.end, include_leading_whitespace));
        Ok(())
    }

    fn compute_indent(&self, whitespace: &str) -> u32 {
        IndentOptions::default().indent_width(whitespace)
    }

    fn render_indent(&self, columns: u32) -> String {
        IndentOptions::default().render(columns)
    }
}

/// Fails the first reformat dispatch and records the rest.
struct FailOnceFormatter {
    failed: RefCell<bool>,
    calls: Calls,
}

impl FailOnceFormatter {
    fn new() -> (Self, Calls) {
        let calls = Calls::default();
        (
            Self {
                failed: RefCell::new(false),
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl RangeFormatter for FailOnceFormatter {
    fn reformat(
        &self,
        _tree: &SyntaxTree,
        _document: &mut Document,
        range: TextRange,
        include_leading_whitespace: bool,
    ) -> Result<(), FormatError> {
        if !*self.failed.borrow() {
            *self.failed.borrow_mut() = true;
            return Err(FormatError::Failed("boom".into()));
        }
        self.calls
            .borrow_mut()
            .push((range.start, range.end, include_leading_whitespace));
        Ok(())
    }

    fn compute_indent(&self, whitespace: &str) -> u32 {
        IndentOptions::default().indent_width(whitespace)
    }

    fn render_indent(&self, columns: u32) -> String {
        IndentOptions::default().render(columns)
    }
}

/// One document with a single generated block node, the smallest shape that queues work.
fn tree_with_generated_block(len: usize, start: usize, end: usize) -> (SyntaxTree, postfmt_core::NodeId) {
    let mut tree = SyntaxTree::new(TextRange::new(0, len));
    let block = tree.add_child(tree.root(), TextRange::new(start, end));
    tree.set_generated(block, true);
    (tree, block)
}

#[test]
fn test_pass_runs_only_when_outermost_scope_closes() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree, block) = tree_with_generated_block(30, 5, 15);
    let id = session.add_document(&"x".repeat(30), tree);

    session
        .postpone_formatting_inside(|session| {
            session
                .postpone_formatting_inside(|session| {
                    session
                        .record_tree_change(id, block, TreeChangeKind::Added)
                        .unwrap();
                })
                .unwrap();
            // The inner scope closed but the outer one is still open.
            assert!(calls.borrow().is_empty());
            assert!(session.is_locked(id));
        })
        .unwrap();

    assert_eq!(*calls.borrow(), vec![(5, 15, true)]);
    assert!(!session.is_locked(id));
}

#[test]
fn test_disabled_recording_drops_changes() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree, block) = tree_with_generated_block(30, 5, 15);
    let id = session.add_document(&"x".repeat(30), tree);

    session
        .postpone_formatting_inside(|session| {
            session.disable_postprocess_formatting_inside(|session| {
                session
                    .record_tree_change(id, block, TreeChangeKind::Added)
                    .unwrap();
            });
            assert!(!session.is_locked(id));
        })
        .unwrap();

    assert!(calls.borrow().is_empty());
}

#[test]
fn test_recording_outside_any_scope_is_dropped() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree, block) = tree_with_generated_block(30, 5, 15);
    let id = session.add_document(&"x".repeat(30), tree);

    session
        .record_tree_change(id, block, TreeChangeKind::Added)
        .unwrap();
    assert!(!session.is_locked(id));

    session.postpone_formatting_inside(|_| {}).unwrap();
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_uncommitted_and_disabled_closes_retain_the_queue() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree, block) = tree_with_generated_block(30, 5, 15);
    let id = session.add_document(&"x".repeat(30), tree);

    // The host has text edits the tree does not reflect yet; the close defers.
    session.document_mut(id).unwrap().set_uncommitted(true);
    session
        .postpone_formatting_inside(|session| {
            session
                .record_tree_change(id, block, TreeChangeKind::Added)
                .unwrap();
        })
        .unwrap();
    assert!(session.is_locked(id));
    assert!(calls.borrow().is_empty());

    // A close that happens while formatting is disabled also retains the queue.
    session.disable_postprocess_formatting_inside(|session| {
        session.postpone_formatting_inside(|_| {}).unwrap();
    });
    assert!(session.is_locked(id));
    assert!(calls.borrow().is_empty());

    // Once the host commits, the next close picks the queue back up.
    session.document_mut(id).unwrap().set_uncommitted(false);
    session.postpone_formatting_inside(|_| {}).unwrap();
    assert!(!session.is_locked(id));
    assert_eq!(*calls.borrow(), vec![(5, 15, true)]);
}

#[test]
fn test_failed_pass_discards_queue_and_surfaces_error() {
    let (formatter, calls) = FailOnceFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree, block) = tree_with_generated_block(30, 5, 15);
    let id = session.add_document(&"x".repeat(30), tree);

    let err = session
        .postpone_formatting_inside(|session| {
            session
                .record_tree_change(id, block, TreeChangeKind::Added)
                .unwrap();
        })
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::PassFailed {
            document: id,
            error: FormatError::Failed("boom".into()),
        }
    );

    // The failed document's queue is gone and nothing leaked.
    assert!(!session.is_locked(id));
    assert!(calls.borrow().is_empty());
    assert_eq!(session.document(id).unwrap().text(), "x".repeat(30));
    assert_eq!(session.document(id).unwrap().live_marker_count(), 0);
}

#[test]
fn test_first_failure_aborts_sweep_but_keeps_later_queues() {
    let (formatter, calls) = FailOnceFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree_a, block_a) = tree_with_generated_block(30, 2, 8);
    let (tree_b, block_b) = tree_with_generated_block(30, 12, 20);
    let a = session.add_document(&"x".repeat(30), tree_a);
    let b = session.add_document(&"x".repeat(30), tree_b);

    let err = session
        .postpone_formatting_inside(|session| {
            session
                .record_tree_change(a, block_a, TreeChangeKind::Added)
                .unwrap();
            session
                .record_tree_change(b, block_b, TreeChangeKind::Replaced)
                .unwrap();
        })
        .unwrap_err();
    assert!(matches!(err, SessionError::PassFailed { document, .. } if document == a));

    // Document `b` never ran; a later close finishes it.
    assert!(!session.is_locked(a));
    assert!(session.is_locked(b));
    session.postpone_formatting_inside(|_| {}).unwrap();
    assert!(!session.is_locked(b));
    assert_eq!(*calls.borrow(), vec![(12, 20, true)]);
}

#[test]
fn test_multi_document_pass_covers_every_queued_document() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree_a, block_a) = tree_with_generated_block(30, 2, 8);
    let (tree_b, block_b) = tree_with_generated_block(30, 12, 20);
    let a = session.add_document(&"x".repeat(30), tree_a);
    let b = session.add_document(&"x".repeat(30), tree_b);

    session
        .postpone_formatting_inside(|session| {
            session
                .record_tree_change(b, block_b, TreeChangeKind::Added)
                .unwrap();
            session
                .record_tree_change(a, block_a, TreeChangeKind::Added)
                .unwrap();
        })
        .unwrap();

    // Documents run in registration order regardless of recording order.
    assert_eq!(*calls.borrow(), vec![(2, 8, true), (12, 20, true)]);
    assert!(!session.is_locked(a));
    assert!(!session.is_locked(b));
}

#[test]
fn test_forced_run_harvests_bare_reformat_marks() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let mut tree = SyntaxTree::new(TextRange::new(0, 30));
    let node = tree.add_child(tree.root(), TextRange::new(10, 18));
    let id = session.add_document(&"x".repeat(30), tree);

    session.tree_mut(id).unwrap().mark_reformat_before(node);
    assert!(!session.is_locked(id));

    session.run_postponed_formatting(id).unwrap();
    // The zero-length mark widened to the first following character.
    assert_eq!(*calls.borrow(), vec![(10, 11, false)]);
    assert!(!session.tree(id).unwrap().is_marked_reformat_before(node));
}

#[test]
fn test_forced_run_respects_the_disable_guard() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let mut tree = SyntaxTree::new(TextRange::new(0, 30));
    let node = tree.add_child(tree.root(), TextRange::new(10, 18));
    let id = session.add_document(&"x".repeat(30), tree);

    session.tree_mut(id).unwrap().mark_reformat(node);
    session.disable_postprocess_formatting_inside(|session| {
        session.run_postponed_formatting(id).unwrap();
    });

    // Nothing ran and the mark survived for a later pass.
    assert!(calls.borrow().is_empty());
    assert!(session.tree(id).unwrap().is_marked_reformat(node));

    session.run_postponed_formatting(id).unwrap();
    assert_eq!(*calls.borrow(), vec![(10, 18, false)]);
}

#[test]
fn test_forced_run_unknown_document_errors() {
    let (formatter, _calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let id = session.add_document("abc", SyntaxTree::new(TextRange::new(0, 3)));
    session.remove_document(id).unwrap();
    assert_eq!(
        session.run_postponed_formatting(id),
        Err(SessionError::DocumentNotFound(id))
    );
}

#[test]
fn test_removing_a_document_discards_its_queue() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree, block) = tree_with_generated_block(30, 5, 15);
    let id = session.add_document(&"x".repeat(30), tree);

    session
        .postpone_formatting_inside(|session| {
            session
                .record_tree_change(id, block, TreeChangeKind::Added)
                .unwrap();
            session.remove_document(id).unwrap();
        })
        .unwrap();

    assert!(calls.borrow().is_empty());
    assert_eq!(session.document_count(), 0);
}

#[test]
fn test_end_to_end_reindent_of_embedded_content() {
    // A generated wrapper encloses content that was moved in from elsewhere: the wrapper
    // gets free-formatted, the moved content only shifts sideways.
    let text = "start\n    first line\nsecond line\nend\n";
    let mut tree = SyntaxTree::new(TextRange::new(0, text.chars().count()));
    let wrapper = tree.add_child(tree.root(), TextRange::new(6, 33));
    let moved = tree.add_child(wrapper, TextRange::new(10, 33));
    tree.set_generated(wrapper, true);
    tree.record_old_indentation(moved, 0);

    let mut session = FormattingSession::new(IndentOnlyFormatter::default());
    let id = session.add_document(text, tree);

    session
        .postpone_formatting_inside(|session| {
            session
                .record_tree_change(id, wrapper, TreeChangeKind::Added)
                .unwrap();
        })
        .unwrap();

    assert_eq!(
        session.document(id).unwrap().text(),
        "start\n    first line\n    second line\nend\n"
    );
    assert_eq!(session.document(id).unwrap().live_marker_count(), 0);
}

#[test]
fn test_pass_is_idempotent_once_flags_are_consumed() {
    let (formatter, calls) = RecordingFormatter::new();
    let mut session = FormattingSession::new(formatter);
    let (tree, block) = tree_with_generated_block(30, 5, 15);
    let id = session.add_document(&"x".repeat(30), tree);

    session
        .postpone_formatting_inside(|session| {
            session
                .record_tree_change(id, block, TreeChangeKind::Added)
                .unwrap();
        })
        .unwrap();
    assert_eq!(calls.borrow().len(), 1);

    // The generated flag was consumed by the first pass; forcing another finds nothing.
    session.run_postponed_formatting(id).unwrap();
    assert_eq!(calls.borrow().len(), 1);
}
