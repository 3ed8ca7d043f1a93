//! Document text plus its marker table.
//!
//! [`Document`] is the single mutation point of the engine: every edit goes through
//! [`Document::replace`], which keeps all registered range markers adjusted. Offsets are
//! character offsets; line indices follow the ropey convention where a trailing newline
//! starts a final empty line.

use ropey::Rope;

use crate::marker::{MarkerId, MarkerTable};
use crate::range::TextRange;

/// Errors returned by document editing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// A range was inverted or reached past the end of the document.
    InvalidRange {
        /// Start offset of the offending range.
        start: usize,
        /// End offset of the offending range.
        end: usize,
        /// Document length in characters at the time of the call.
        len: usize,
    },
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::InvalidRange { start, end, len } => {
                write!(
                    f,
                    "invalid range {start}..{end} for a document of {len} characters"
                )
            }
        }
    }
}

impl std::error::Error for DocumentError {}

/// A text document with live range markers.
///
/// The `uncommitted` flag is host-driven: it signals that the text has pending changes the
/// syntax tree does not reflect yet, which makes the session defer postponed formatting for
/// this document until the host clears the flag.
#[derive(Debug)]
pub struct Document {
    rope: Rope,
    markers: MarkerTable,
    version: u64,
    uncommitted: bool,
}

impl Document {
    /// Create a document holding `text`.
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            markers: MarkerTable::new(),
            version: 0,
            uncommitted: false,
        }
    }

    /// Length in characters.
    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    /// The full text.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// The text covered by `range`.
    pub fn slice(&self, range: TextRange) -> Result<String, DocumentError> {
        self.check_range(range)?;
        Ok(self.rope.slice(range.start..range.end).to_string())
    }

    /// Replace `range` with `text`, shifting all markers.
    ///
    /// Replacing an empty range with empty text is a no-op and does not bump the version.
    pub fn replace(&mut self, range: TextRange, text: &str) -> Result<(), DocumentError> {
        self.check_range(range)?;
        if range.is_empty() && text.is_empty() {
            return Ok(());
        }
        if !range.is_empty() {
            self.rope.remove(range.start..range.end);
            self.markers.update_for_deletion(range.start, range.end);
        }
        if !text.is_empty() {
            self.rope.insert(range.start, text);
            self.markers.update_for_insertion(range.start, text.chars().count());
        }
        self.version += 1;
        Ok(())
    }

    /// Number of lines. A trailing newline starts a final empty line.
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Index of the line containing `offset`, clamped to the last line.
    pub fn line_of_offset(&self, offset: usize) -> usize {
        self.rope.char_to_line(offset.min(self.rope.len_chars()))
    }

    /// Character offset of the first character of `line`, clamped to the document end.
    pub fn line_start(&self, line: usize) -> usize {
        if line >= self.rope.len_lines() {
            return self.rope.len_chars();
        }
        self.rope.line_to_char(line)
    }

    /// Text of `line` without its trailing line break, or `None` past the last line.
    pub fn line_text(&self, line: usize) -> Option<String> {
        if line >= self.rope.len_lines() {
            return None;
        }
        let mut text = self.rope.line(line).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        if text.ends_with('\r') {
            text.pop();
        }
        Some(text)
    }

    /// Create a marker tracking `range`.
    ///
    /// # Panics
    ///
    /// Panics if `range` reaches past the end of the document; pending ranges are derived
    /// from tree nodes, and a node range outside the document is a caller bug.
    pub fn create_marker(&mut self, range: TextRange) -> MarkerId {
        assert!(
            range.end <= self.rope.len_chars(),
            "marker range {} exceeds document length {}",
            range,
            self.rope.len_chars()
        );
        self.markers.create(range)
    }

    /// Current range of `id`, or `None` once invalidated or released.
    pub fn marker_range(&self, id: MarkerId) -> Option<TextRange> {
        self.markers.range(id)
    }

    /// Release `id`. No-op if already released.
    pub fn release_marker(&mut self, id: MarkerId) {
        self.markers.release(id);
    }

    /// Number of markers not yet released.
    pub fn live_marker_count(&self) -> usize {
        self.markers.live_count()
    }

    /// Edit generation counter; every effective [`Document::replace`] increments it.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the text has host-side changes the syntax tree does not reflect yet.
    pub fn is_uncommitted(&self) -> bool {
        self.uncommitted
    }

    /// Set or clear the uncommitted flag.
    pub fn set_uncommitted(&mut self, uncommitted: bool) {
        self.uncommitted = uncommitted;
    }

    fn check_range(&self, range: TextRange) -> Result<(), DocumentError> {
        if range.start > range.end || range.end > self.rope.len_chars() {
            return Err(DocumentError::InvalidRange {
                start: range.start,
                end: range.end,
                len: self.rope.len_chars(),
            });
        }
        Ok(())
    }
}
