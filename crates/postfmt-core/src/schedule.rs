//! The interval scheduler.
//!
//! Harvested (range, action) pairs usually overlap: a generated block may sit inside a
//! larger reformat request, a moved subtree needs a reindent while its new surroundings need
//! free-formatting, and zero-length "format before this node" markers land on the edges of
//! both. [`PendingSet::normalize`] resolves one round of that contention into an execution
//! batch of pairwise-disjoint tasks whose order is safe to run front to back; residue from
//! splitting stays in the set for the next round.

use std::cmp::Ordering;

use log::{debug, warn};

use crate::document::Document;
use crate::marker::MarkerId;
use crate::range::TextRange;

/// What to do with a pending range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Free-format the range, rewriting the whitespace leading into it as well.
    Reformat,
    /// Free-format the range starting at its first non-whitespace character.
    ///
    /// The leading whitespace is left to whoever owns it: this is the kind carried by
    /// zero-length format markers and by the trailing piece of a split, where the reindent
    /// that caused the split owns the boundary.
    ReformatFromFirstNonWhitespace,
    /// Shift the indentation of every line in the range by the difference between the
    /// range's current first-line indentation and `old_indent`.
    Reindent {
        /// Indentation (in columns) the content had before it was moved.
        old_indent: u32,
    },
}

impl PendingAction {
    /// Whether this is the indentation-shifting action.
    pub fn is_reindent(&self) -> bool {
        matches!(self, PendingAction::Reindent { .. })
    }

    /// Whether this is one of the free-format actions.
    pub fn is_free_format(&self) -> bool {
        !self.is_reindent()
    }
}

/// One scheduled unit: a marker-tracked range plus the action to run on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTask {
    /// Marker tracking the task's range in the owning document.
    pub marker: MarkerId,
    /// The action to execute.
    pub action: PendingAction,
}

/// Scheduling order: end offset descending, zero-length ranges first among equal ends, then
/// start offset ascending.
///
/// The normalization walk relies on two consequences. First, the accumulated range only ever
/// extends toward smaller offsets, which makes the disjoint / touching / overlapping
/// classification against the next task total. Second, a zero-length marker surfaces before
/// any non-empty range ending at the same offset, so it is flushed standalone instead of
/// being absorbed into a neighbor it merely touches.
fn schedule_order(a: TextRange, b: TextRange) -> Ordering {
    b.end
        .cmp(&a.end)
        .then_with(|| b.is_empty().cmp(&a.is_empty()))
        .then_with(|| a.start.cmp(&b.start))
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    range: TextRange,
    task: PendingTask,
}

/// The pending-task set of one document.
///
/// Tasks are kept sorted in scheduling order. Equal ranges are collapsed at insertion time;
/// everything else is resolved by [`PendingSet::normalize`].
#[derive(Debug, Default)]
pub struct PendingSet {
    tasks: Vec<PendingTask>,
}

impl PendingSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate the pending tasks in scheduling order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingTask> {
        self.tasks.iter()
    }

    /// Queue `action` over `range`, creating a marker for it in `document`.
    ///
    /// No two tasks ever share an equal range. A duplicate of an already-queued task is
    /// dropped silently; equal ranges with *different* actions are a harvesting defect and
    /// resolve to the stronger action with a warning (`Reindent` beats the free-format kinds,
    /// since collapsing it would lose the recorded indentation;
    /// `ReformatFromFirstNonWhitespace` beats `Reformat`, keeping the boundary whitespace
    /// untouched for whoever owns it).
    pub fn insert(&mut self, document: &mut Document, range: TextRange, action: PendingAction) {
        let pos = self.tasks.partition_point(|task| {
            match document.marker_range(task.marker) {
                Some(existing) => schedule_order(existing, range) == Ordering::Less,
                // Lost its range already; let normalize report and discard it.
                None => true,
            }
        });

        if let Some(task) = self.tasks.get_mut(pos)
            && let Some(existing) = document.marker_range(task.marker)
            && existing == range
        {
            if task.action != action {
                let keep = collision_winner(task.action, action);
                warn!(
                    "range {range} queued as both {:?} and {:?}; keeping {keep:?}",
                    task.action, action
                );
                task.action = keep;
            }
            return;
        }

        let marker = document.create_marker(range);
        self.tasks.insert(pos, PendingTask { marker, action });
    }

    /// Drop every pending task and release its marker.
    pub fn clear(&mut self, document: &mut Document) {
        for task in self.tasks.drain(..) {
            document.release_marker(task.marker);
        }
    }

    /// Normalize one round: drain the set into a batch of pairwise-disjoint tasks that is
    /// safe to execute front to back, leaving split residue behind for the next round.
    ///
    /// The batch holds all free-format tasks first and all reindents after, each group in
    /// ascending range order. Reindents run last because their indentation delta is measured
    /// against the document *after* the surrounding free-format edits settle the anchor line.
    ///
    /// Callers alternate `normalize` and execute until [`PendingSet::is_empty`]; a round is
    /// never empty while tasks remain, so the loop terminates.
    pub fn normalize(&mut self, document: &mut Document) -> Vec<PendingTask> {
        // Ranges may have drifted since insertion; re-resolve every marker and discard the
        // ones whose text no longer exists.
        let mut queue: Vec<Scheduled> = Vec::with_capacity(self.tasks.len());
        for task in self.tasks.drain(..) {
            match document.marker_range(task.marker) {
                Some(range) => queue.push(Scheduled { range, task }),
                None => {
                    warn!(
                        "dropping {:?}: its range was overwritten before it could run",
                        task.action
                    );
                    document.release_marker(task.marker);
                }
            }
        }
        queue.sort_by(|a, b| schedule_order(a.range, b.range));

        let mut free_format: Vec<PendingTask> = Vec::new();
        let mut reindents: Vec<PendingTask> = Vec::new();
        let mut carry: Vec<PendingTask> = Vec::new();
        let mut acc: Option<Scheduled> = None;

        let mut i = 0;
        while i < queue.len() {
            let current = queue[i];
            i += 1;
            let Some(prev) = acc else {
                acc = Some(current);
                continue;
            };

            let disjoint = current.range.end < prev.range.start
                || (current.range.end == prev.range.start && !can_stick(&prev, &current));
            if disjoint {
                flush(prev, &mut free_format, &mut reindents);
                acc = Some(current);
            } else if prev.task.action.is_free_format() && current.task.action.is_reindent() {
                // A reindent inside free-format territory: the reindent wins the overlap and
                // the free-format range is split around it. The head piece sorts after the
                // current position and is consumed later this round; the tail piece is
                // carried into the next round.
                if prev.range.start < current.range.start {
                    let head = TextRange::new(prev.range.start, current.range.start);
                    let marker = document.create_marker(head);
                    let task = PendingTask {
                        marker,
                        action: PendingAction::Reformat,
                    };
                    let at = i + queue[i..]
                        .partition_point(|s| schedule_order(s.range, head) == Ordering::Less);
                    queue.insert(at, Scheduled { range: head, task });
                }
                if current.range.end < prev.range.end {
                    let tail = TextRange::new(current.range.end, prev.range.end);
                    let marker = document.create_marker(tail);
                    carry.push(PendingTask {
                        marker,
                        action: PendingAction::ReformatFromFirstNonWhitespace,
                    });
                }
                document.release_marker(prev.task.marker);
                acc = Some(current);
            } else if prev.task.action.is_free_format() && current.task.action.is_free_format() {
                let union = prev.range.union(current.range);
                let action = merged_action(&prev, &current);
                let marker = merge_markers(document, &prev, &current, union);
                acc = Some(Scheduled {
                    range: union,
                    task: PendingTask { marker, action },
                });
            } else {
                // The accumulated task is a reindent. It neither merges nor widens, so the
                // request overlapping it is discarded.
                debug!(
                    "dropping {:?} at {}: a reindent at {} owns the overlap",
                    current.task.action, current.range, prev.range
                );
                document.release_marker(current.task.marker);
            }
        }
        if let Some(last) = acc {
            flush(last, &mut free_format, &mut reindents);
        }

        // Tails were pushed in descending end order, which is exactly the set's sort order.
        self.tasks = carry;

        free_format.reverse();
        reindents.reverse();
        free_format.extend(reindents);
        free_format
    }
}

/// Whether two tasks that merely touch (no shared character) may still merge.
///
/// Zero-length markers stand alone, and reindents neither extend nor absorb.
fn can_stick(acc: &Scheduled, current: &Scheduled) -> bool {
    if acc.range.is_empty() || current.range.is_empty() {
        return false;
    }
    acc.task.action.is_free_format() && current.task.action.is_free_format()
}

fn flush(entry: Scheduled, free_format: &mut Vec<PendingTask>, reindents: &mut Vec<PendingTask>) {
    if entry.task.action.is_reindent() {
        reindents.push(entry.task);
    } else {
        free_format.push(entry.task);
    }
}

/// The action of a merged pair: whoever contributes the union's start owns its leading
/// whitespace and therefore decides the kind; on a tied start,
/// `ReformatFromFirstNonWhitespace` wins so the boundary stays untouched.
fn merged_action(a: &Scheduled, b: &Scheduled) -> PendingAction {
    match a.range.start.cmp(&b.range.start) {
        Ordering::Less => a.task.action,
        Ordering::Greater => b.task.action,
        Ordering::Equal => {
            if a.task.action == PendingAction::ReformatFromFirstNonWhitespace
                || b.task.action == PendingAction::ReformatFromFirstNonWhitespace
            {
                PendingAction::ReformatFromFirstNonWhitespace
            } else {
                PendingAction::Reformat
            }
        }
    }
}

/// Reuse a marker that already covers the union, otherwise mint a fresh one. The losing
/// markers are released.
fn merge_markers(
    document: &mut Document,
    a: &Scheduled,
    b: &Scheduled,
    union: TextRange,
) -> MarkerId {
    if a.range == union {
        document.release_marker(b.task.marker);
        a.task.marker
    } else if b.range == union {
        document.release_marker(a.task.marker);
        b.task.marker
    } else {
        document.release_marker(a.task.marker);
        document.release_marker(b.task.marker);
        document.create_marker(union)
    }
}

fn collision_winner(existing: PendingAction, incoming: PendingAction) -> PendingAction {
    use PendingAction::*;
    match (existing, incoming) {
        (Reindent { .. }, _) => existing,
        (_, Reindent { .. }) => incoming,
        (ReformatFromFirstNonWhitespace, _) => existing,
        (_, ReformatFromFirstNonWhitespace) => incoming,
        (Reformat, Reformat) => existing,
    }
}
