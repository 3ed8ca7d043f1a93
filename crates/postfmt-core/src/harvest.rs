//! The range harvester.
//!
//! After a batch of structural edits the tree carries two kinds of residue: *generated*
//! flags on nodes produced by automated edits, and explicit reformat marks placed by edit
//! utilities. Harvesting walks that residue, consumes it, and queues the matching pending
//! tasks: generated regions become free-format requests, and non-generated content embedded
//! in a generated region becomes a reindent request so it keeps its shape while following
//! its new surroundings.

use std::collections::HashSet;

use log::trace;

use crate::document::Document;
use crate::range::TextRange;
use crate::schedule::{PendingAction, PendingSet};
use crate::tree::{NodeId, SyntaxTree};

/// Sweep the whole tree for reformat marks and queue their tasks.
///
/// A node marked *reformat-before* queues a zero-length task at its start offset; a node
/// marked *reformat* queues a task over its whole range. Both marks are consumed, so a
/// second sweep queues nothing new.
pub fn harvest_markers(tree: &mut SyntaxTree, document: &mut Document, pending: &mut PendingSet) {
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        if tree.take_reformat_before(node) {
            let start = checked_range(tree, document, node).start;
            pending.insert(
                document,
                TextRange::empty_at(start),
                PendingAction::ReformatFromFirstNonWhitespace,
            );
        }
        if tree.take_reformat(node) {
            let range = checked_range(tree, document, node);
            pending.insert(
                document,
                range,
                PendingAction::ReformatFromFirstNonWhitespace,
            );
        }
        stack.extend_from_slice(tree.children(node));
    }
}

/// Walk every touched subtree and queue the actions its generated boundaries call for.
///
/// Each walk tracks whether the current position is inside generated output. Entering a
/// generated node from non-generated context queues a free-format task over it; meeting a
/// non-generated node inside generated context queues a reindent over it using the node's
/// recorded pre-edit indentation, except for pure-whitespace nodes, which are skipped along
/// with their subtrees. Every visited node's generated flag is consumed.
///
/// A touched node encountered inside another touched node's walk is skipped entirely; its
/// own walk still sees the flags untouched and covers it.
///
/// # Panics
///
/// Panics when a non-whitespace node surfaces in generated context without a recorded
/// pre-edit indentation, and when a node range reaches past the document end. Both are bugs
/// in the mutation layer: it must record indentation before embedding existing content in
/// generated output, and must keep node ranges in bounds.
pub fn harvest_touched(
    tree: &mut SyntaxTree,
    document: &mut Document,
    pending: &mut PendingSet,
    touched: &[NodeId],
) {
    let touched_set: HashSet<NodeId> = touched.iter().copied().collect();

    for &root in touched {
        // Seed the context with the inverse of the node's own flag so the root takes its
        // matching transition arm below, exactly as a deeper node would.
        let seed = !tree.is_generated(root);
        let mut stack: Vec<(NodeId, bool)> = vec![(root, seed)];

        while let Some((node, inherited)) = stack.pop() {
            if node != root && touched_set.contains(&node) {
                trace!("{node:?} is separately touched; skipping");
                continue;
            }

            let node_generated = tree.is_generated(node);
            tree.set_generated(node, false);

            let mut in_generated = inherited;
            if node_generated && !in_generated {
                let range = checked_range(tree, document, node);
                pending.insert(document, range, PendingAction::Reformat);
                in_generated = true;
            }
            if !node_generated && in_generated {
                if tree.is_whitespace(node) {
                    trace!("{node:?} is whitespace; skipping subtree");
                    continue;
                }
                let range = checked_range(tree, document, node);
                let old_indent = tree.take_old_indentation(node).unwrap_or_else(|| {
                    panic!(
                        "non-generated node {node:?} at {range} surfaced in generated output \
                         with no recorded indentation"
                    )
                });
                pending.insert(document, range, PendingAction::Reindent { old_indent });
                in_generated = false;
            }

            for &child in tree.children(node) {
                stack.push((child, in_generated));
            }
        }
    }
}

fn checked_range(tree: &SyntaxTree, document: &Document, node: NodeId) -> TextRange {
    let range = tree.range(node);
    assert!(
        range.end <= document.len_chars(),
        "node {:?} range {} exceeds document length {}",
        node,
        range,
        document.len_chars()
    );
    range
}
