//! The formatting seam.
//!
//! The engine never computes layout itself. Free-format tasks are dispatched through
//! [`RangeFormatter::reformat`], and the reindent executor borrows the formatter's indent
//! math ([`RangeFormatter::compute_indent`] / [`RangeFormatter::render_indent`]) so that
//! engine-made indentation matches whatever the host formatter would produce.

use crate::document::{Document, DocumentError};
use crate::range::TextRange;
use crate::tree::SyntaxTree;

/// Errors surfaced by a [`RangeFormatter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A document edit made by the formatter failed.
    Document(DocumentError),
    /// The formatter rejected the request.
    Failed(String),
}

impl From<DocumentError> for FormatError {
    fn from(err: DocumentError) -> Self {
        FormatError::Document(err)
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::Document(err) => write!(f, "document edit failed: {err}"),
            FormatError::Failed(reason) => write!(f, "formatter failed: {reason}"),
        }
    }
}

impl std::error::Error for FormatError {}

/// Indentation measurement and rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndentOptions {
    /// Render indentation with tabs (space-padded up to the exact column) instead of spaces.
    pub use_tabs: bool,
    /// Tab stop width in columns, used when measuring existing whitespace.
    pub tab_size: usize,
    /// Columns per indentation level.
    pub indent_size: usize,
}

impl Default for IndentOptions {
    fn default() -> Self {
        Self {
            use_tabs: false,
            tab_size: 4,
            indent_size: 4,
        }
    }
}

impl IndentOptions {
    /// Measure a whitespace run in columns, expanding tabs to the next tab stop.
    pub fn indent_width(&self, whitespace: &str) -> u32 {
        let tab = self.tab_size.max(1);
        let mut columns = 0usize;
        for ch in whitespace.chars() {
            if ch == '\t' {
                columns += tab - columns % tab;
            } else {
                columns += 1;
            }
        }
        columns as u32
    }

    /// Render `columns` of indentation.
    pub fn render(&self, columns: u32) -> String {
        let columns = columns as usize;
        if self.use_tabs {
            let tab = self.tab_size.max(1);
            let mut out = "\t".repeat(columns / tab);
            out.push_str(&" ".repeat(columns % tab));
            out
        } else {
            " ".repeat(columns)
        }
    }
}

/// A host formatter the engine dispatches normalized tasks through.
pub trait RangeFormatter {
    /// Reformat `range` of `document`.
    ///
    /// With `include_leading_whitespace` the whitespace leading into the range is rewritten
    /// as well; without it, formatting starts at the first non-whitespace character so that
    /// an adjacent task keeps ownership of the boundary whitespace.
    fn reformat(
        &self,
        tree: &SyntaxTree,
        document: &mut Document,
        range: TextRange,
        include_leading_whitespace: bool,
    ) -> Result<(), FormatError>;

    /// Measure a leading-whitespace run in columns.
    fn compute_indent(&self, whitespace: &str) -> u32;

    /// Render `columns` of indentation as text.
    fn render_indent(&self, columns: u32) -> String;
}

/// A formatter that performs no free-format layout and only supplies indent math.
///
/// Useful for hosts that want automated reindenting without a real formatting engine, and
/// as a quiet backend in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndentOnlyFormatter {
    /// Indent measurement and rendering options.
    pub options: IndentOptions,
}

impl IndentOnlyFormatter {
    /// Create with explicit options.
    pub fn new(options: IndentOptions) -> Self {
        Self { options }
    }
}

impl RangeFormatter for IndentOnlyFormatter {
    fn reformat(
        &self,
        _tree: &SyntaxTree,
        _document: &mut Document,
        _range: TextRange,
        _include_leading_whitespace: bool,
    ) -> Result<(), FormatError> {
        Ok(())
    }

    fn compute_indent(&self, whitespace: &str) -> u32 {
        self.options.indent_width(whitespace)
    }

    fn render_indent(&self, columns: u32) -> String {
        self.options.render(columns)
    }
}
