//! The action executor.
//!
//! Takes one normalized batch from the scheduler and applies it to the document:
//! free-format tasks go through the host formatter, reindent tasks are computed here from
//! the formatter's indent math. Every task resolves its range through its marker at the
//! moment it runs, so earlier edits in the batch cannot corrupt later tasks.

use log::{debug, warn};

use crate::document::Document;
use crate::format::{FormatError, RangeFormatter};
use crate::range::TextRange;
use crate::schedule::{PendingAction, PendingTask};
use crate::tree::SyntaxTree;

/// Run every task in `batch` front to back, releasing each task's marker afterwards.
///
/// A task whose marker was invalidated is skipped with a warning. The first formatter
/// failure aborts the batch; the markers of the remaining tasks are still released, so a
/// failed batch leaks nothing into the document.
pub fn execute_batch<F: RangeFormatter>(
    formatter: &F,
    tree: &SyntaxTree,
    document: &mut Document,
    batch: Vec<PendingTask>,
) -> Result<(), FormatError> {
    let mut tasks = batch.into_iter();
    while let Some(task) = tasks.next() {
        let result = execute_task(formatter, tree, document, task);
        document.release_marker(task.marker);
        if result.is_err() {
            for rest in tasks {
                document.release_marker(rest.marker);
            }
            return result;
        }
    }
    Ok(())
}

fn execute_task<F: RangeFormatter>(
    formatter: &F,
    tree: &SyntaxTree,
    document: &mut Document,
    task: PendingTask,
) -> Result<(), FormatError> {
    let Some(range) = document.marker_range(task.marker) else {
        warn!("skipping {:?}: its marker was invalidated before execution", task.action);
        return Ok(());
    };

    match task.action {
        PendingAction::Reformat => formatter.reformat(tree, document, range, true),
        PendingAction::ReformatFromFirstNonWhitespace => {
            let range = if range.is_empty() {
                if range.start >= document.len_chars() {
                    debug!("skipping format marker at {}: nothing follows it", range.start);
                    return Ok(());
                }
                // A zero-length marker means "format before what starts here"; hand the
                // formatter the first following character to anchor on.
                TextRange::new(range.start, range.start + 1)
            } else {
                range
            };
            formatter.reformat(tree, document, range, false)
        }
        PendingAction::Reindent { old_indent } => {
            reindent(formatter, document, range, old_indent)
        }
    }
}

/// Shift the indentation of the lines of `range` by the difference between the anchor
/// line's current indentation and `old_indent`.
///
/// The anchor is the line containing `range.start`. Its own indentation is owned by
/// whatever free-format task settled it earlier in the batch and is never rewritten here;
/// it only supplies the target the remaining lines shift toward. Lines are rewritten back
/// to front so an edit never moves a line still waiting, whitespace-only lines are left
/// alone, and a shift below column zero clamps.
pub fn reindent<F: RangeFormatter>(
    formatter: &F,
    document: &mut Document,
    range: TextRange,
    old_indent: u32,
) -> Result<(), FormatError> {
    let anchor_line = document.line_of_offset(range.start);
    let anchor_text = document.line_text(anchor_line).unwrap_or_default();
    let new_indent = formatter.compute_indent(leading_whitespace(&anchor_text));
    let delta = i64::from(new_indent) - i64::from(old_indent);
    if delta == 0 {
        return Ok(());
    }

    let last_line = document.line_of_offset(range.end);
    for line in (anchor_line + 1..=last_line).rev() {
        let line_start = document.line_start(line);
        if line_start >= range.end {
            // The line beginning exactly at `range.end` is outside the half-open range.
            continue;
        }
        let Some(text) = document.line_text(line) else {
            continue;
        };
        let run = leading_whitespace(&text);
        if run.len() == text.len() {
            continue;
        }
        let current = formatter.compute_indent(run);
        let target = (i64::from(current) + delta).max(0) as u32;
        if target == current {
            continue;
        }
        let run_len = run.chars().count();
        let rendered = formatter.render_indent(target);
        document.replace(TextRange::new(line_start, line_start + run_len), &rendered)?;
    }
    Ok(())
}

fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}
