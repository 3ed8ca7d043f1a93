//! Range markers that track text positions across edits.
//!
//! A marker registers a [`TextRange`] and keeps it pointing at the same text while the
//! owning document is edited: insertions and deletions elsewhere shift it, edits across its
//! boundaries shrink it, and a deletion swallowing it whole invalidates it. The scheduler
//! pins every pending range with a marker so that executing one task cannot silently corrupt
//! the ranges of the tasks still waiting.

use std::collections::BTreeMap;

use crate::range::TextRange;

/// Opaque handle to a marker in a [`MarkerTable`].
///
/// Ids are monotonic and never reused, so a stale handle resolves to `None` instead of
/// aliasing a newer marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerId(u64);

impl MarkerId {
    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerState {
    Valid(TextRange),
    Invalid,
}

/// The set of live markers owned by one document.
///
/// Markers are created with [`MarkerTable::create`], move with
/// [`MarkerTable::update_for_insertion`] / [`MarkerTable::update_for_deletion`], and are
/// resolved with [`MarkerTable::range`]. A resolved `None` means the marked text no longer
/// exists (or the marker was released).
#[derive(Debug, Default)]
pub struct MarkerTable {
    next_id: u64,
    markers: BTreeMap<MarkerId, MarkerState>,
}

impl MarkerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a marker for `range`.
    pub fn create(&mut self, range: TextRange) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.markers.insert(id, MarkerState::Valid(range));
        id
    }

    /// Current range of `id`, or `None` if it was invalidated or released.
    pub fn range(&self, id: MarkerId) -> Option<TextRange> {
        match self.markers.get(&id) {
            Some(MarkerState::Valid(range)) => Some(*range),
            _ => None,
        }
    }

    /// Drop a marker. Releasing an unknown marker is a no-op.
    pub fn release(&mut self, id: MarkerId) {
        self.markers.remove(&id);
    }

    /// Number of markers not yet released (valid or invalidated).
    pub fn live_count(&self) -> usize {
        self.markers.len()
    }

    /// Adjust every marker for an insertion of `len` characters at `pos`.
    ///
    /// Markers starting at or after `pos` shift right; markers spanning `pos` grow. A
    /// zero-length marker sitting exactly at `pos` follows the insertion point.
    pub fn update_for_insertion(&mut self, pos: usize, len: usize) {
        if len == 0 {
            return;
        }
        for state in self.markers.values_mut() {
            if let MarkerState::Valid(range) = state {
                if range.start >= pos {
                    range.start += len;
                    range.end += len;
                } else if range.end > pos {
                    range.end += len;
                }
            }
        }
    }

    /// Adjust every marker for a deletion of `[start, end)`.
    ///
    /// Markers after the deletion shift left, markers overlapping one boundary are truncated
    /// to the surviving text, and a non-empty marker fully inside the deleted span is
    /// invalidated. A zero-length marker inside the span collapses onto `start` and stays
    /// valid.
    pub fn update_for_deletion(&mut self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let delta = end - start;
        for state in self.markers.values_mut() {
            let MarkerState::Valid(range) = *state else {
                continue;
            };
            *state = delete_adjusted(range, start, end, delta);
        }
    }
}

fn delete_adjusted(range: TextRange, start: usize, end: usize, delta: usize) -> MarkerState {
    if range.end <= start {
        // Entirely before the deletion.
        MarkerState::Valid(range)
    } else if range.start >= end {
        // Entirely after: shift left.
        MarkerState::Valid(TextRange::new(range.start - delta, range.end - delta))
    } else if range.start >= start && range.end <= end {
        if range.is_empty() {
            // An insertion point inside the deleted span collapses onto its start.
            MarkerState::Valid(TextRange::empty_at(start))
        } else {
            MarkerState::Invalid
        }
    } else if range.start < start && range.end > end {
        // Spans the whole deletion: shrink by the deleted length.
        MarkerState::Valid(TextRange::new(range.start, range.end - delta))
    } else if range.start < start {
        // Tail overlaps the deletion: cut it off.
        MarkerState::Valid(TextRange::new(range.start, start))
    } else {
        // Head overlaps the deletion: the survivor begins where the deletion did.
        MarkerState::Valid(TextRange::new(start, range.end - delta))
    }
}
