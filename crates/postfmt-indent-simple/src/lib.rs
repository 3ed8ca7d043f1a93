//! `postfmt-indent-simple` - Simple (bracket-counting) formatting backend for `postfmt-core`.
//!
//! This crate is intended for lightweight brace-structured text (JSON/config/small DSLs)
//! where a full formatting engine is unnecessary: it reindents lines from bracket depth,
//! collapses interior whitespace runs to a single space, and strips trailing whitespace.
//! Everything else, including anything covered by a protected-span rule, is left alone.

use postfmt_core::{Document, FormatError, IndentOptions, RangeFormatter, SyntaxTree, TextRange};
use regex::Regex;

/// A regex marking line spans the formatter must not touch.
///
/// Typical rules cover string literals and line comments. Patterns run per line, so
/// multi-line constructs are not supported.
#[derive(Debug, Clone)]
pub struct ProtectedSpanRule {
    regex: Regex,
}

impl ProtectedSpanRule {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// A bracket-counting [`RangeFormatter`].
///
/// Indentation is one level per unbalanced `{`, `[` or `(` above the line; a line whose
/// first character closes a bracket dedents itself. It is *not* intended to be a full
/// formatter.
#[derive(Debug, Clone)]
pub struct SimpleIndentFormatter {
    options: IndentOptions,
    rules: Vec<ProtectedSpanRule>,
}

impl SimpleIndentFormatter {
    pub fn new(options: IndentOptions, rules: Vec<ProtectedSpanRule>) -> Self {
        Self { options, rules }
    }

    /// A formatter protecting double-quoted strings and `//` line comments.
    pub fn with_default_rules(options: IndentOptions) -> Result<Self, regex::Error> {
        Ok(Self::new(
            options,
            vec![
                // Double-quoted string (single-line, handles escapes)
                ProtectedSpanRule::new(r#""(?:\\.|[^"\\])*""#)?,
                // Line comment
                ProtectedSpanRule::new(r"//.*")?,
            ],
        ))
    }

    pub fn options(&self) -> IndentOptions {
        self.options
    }

    pub fn rules(&self) -> &[ProtectedSpanRule] {
        &self.rules
    }

    fn reformat_lines(
        &self,
        document: &mut Document,
        range: TextRange,
        include_leading_whitespace: bool,
    ) -> Result<(), FormatError> {
        if range.is_empty() {
            return Ok(());
        }
        let first_line = document.line_of_offset(range.start);
        let last_line = document.line_of_offset(range.end - 1);

        // Brackets above the range decide its starting depth.
        let mut depth = 0u32;
        for line in 0..first_line {
            let Some(line_text) = document.line_text(line) else {
                continue;
            };
            let protected = protected_columns(&self.rules, &line_text);
            depth = next_depth(depth, &line_text, &protected);
        }

        // Plan every edit against the current text, then apply back to front so earlier
        // offsets stay valid.
        let mut edits: Vec<(TextRange, String)> = Vec::new();

        for line in first_line..=last_line {
            let Some(line_text) = document.line_text(line) else {
                continue;
            };
            let line_start = document.line_start(line);
            let protected = protected_columns(&self.rules, &line_text);
            let chars: Vec<char> = line_text.chars().collect();
            let leading_len = chars
                .iter()
                .take_while(|&&c| c == ' ' || c == '\t')
                .count();

            // The first line's leading run is only ours when the dispatch says so and the
            // range actually reaches into it; on later lines it always is.
            let owns_leading = if line == first_line {
                include_leading_whitespace && range.start <= line_start + leading_len
            } else {
                true
            };
            let leading_in_range = line_start + leading_len <= range.end;

            if leading_len == chars.len() {
                // Whitespace-only line; clear it when the run is ours.
                if leading_len > 0 && owns_leading && leading_in_range {
                    edits.push((
                        TextRange::new(line_start, line_start + leading_len),
                        String::new(),
                    ));
                }
                continue;
            }

            let closes = !is_protected(&protected, leading_len)
                && matches!(chars[leading_len], '}' | ']' | ')');
            let effective = if closes { depth.saturating_sub(1) } else { depth };
            let target = effective * self.options.indent_size as u32;
            let rendered = self.options.render(target);
            let leading: String = chars[..leading_len].iter().collect();
            if owns_leading && leading_in_range && rendered != leading {
                edits.push((TextRange::new(line_start, line_start + leading_len), rendered));
            }

            // Collapse interior runs to one space and drop trailing runs.
            let mut col = leading_len;
            while col < chars.len() {
                if chars[col] != ' ' && chars[col] != '\t' {
                    col += 1;
                    continue;
                }
                let run_start = col;
                while col < chars.len() && (chars[col] == ' ' || chars[col] == '\t') {
                    col += 1;
                }
                let run_end = col;
                let absolute = TextRange::new(line_start + run_start, line_start + run_end);
                if absolute.start < range.start || absolute.end > range.end {
                    continue;
                }
                if span_overlaps(&protected, run_start, run_end) {
                    continue;
                }
                if run_end == chars.len() {
                    edits.push((absolute, String::new()));
                } else if run_end - run_start > 1 || chars[run_start] == '\t' {
                    edits.push((absolute, " ".to_string()));
                }
            }

            depth = next_depth(depth, &line_text, &protected);
        }

        for (edit, text) in edits.into_iter().rev() {
            document.replace(edit, &text)?;
        }
        Ok(())
    }
}

impl RangeFormatter for SimpleIndentFormatter {
    fn reformat(
        &self,
        _tree: &SyntaxTree,
        document: &mut Document,
        range: TextRange,
        include_leading_whitespace: bool,
    ) -> Result<(), FormatError> {
        self.reformat_lines(document, range, include_leading_whitespace)
    }

    fn compute_indent(&self, whitespace: &str) -> u32 {
        self.options.indent_width(whitespace)
    }

    fn render_indent(&self, columns: u32) -> String {
        self.options.render(columns)
    }
}

/// Match every rule against one line and collect the protected char-column spans.
fn protected_columns(rules: &[ProtectedSpanRule], line_text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    for rule in rules {
        for m in rule.regex.find_iter(line_text) {
            if m.start() >= m.end() {
                continue;
            }
            let start_col = line_text[..m.start()].chars().count();
            let end_col = line_text[..m.end()].chars().count();
            spans.push((start_col, end_col));
        }
    }
    spans
}

fn is_protected(spans: &[(usize, usize)], col: usize) -> bool {
    spans.iter().any(|&(start, end)| col >= start && col < end)
}

fn span_overlaps(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    spans.iter().any(|&(s, e)| s < end && start < e)
}

fn next_depth(mut depth: u32, line_text: &str, protected: &[(usize, usize)]) -> u32 {
    for (col, ch) in line_text.chars().enumerate() {
        if is_protected(protected, col) {
            continue;
        }
        match ch {
            '{' | '[' | '(' => depth += 1,
            '}' | ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}
