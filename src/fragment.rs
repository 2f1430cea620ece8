//! Fragment selection for large buffers.
//!
//! Shipping the whole buffer on every keystroke is prohibitively slow
//! for the analysis server once files grow past a few hundred lines.
//! Instead a bounded slice around the cursor is sent, anchored at the
//! most plausible enclosing function boundary.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::buffer::BufferSnapshot;

/// Buffers with more lines than this are never sent whole.
pub const FRAGMENT_THRESHOLD: usize = 250;

/// Lines scanned backwards from the cursor for a function boundary.
const LOOKBACK_LINES: usize = 50;

/// Lines included after the cursor.
const LOOKAHEAD_LINES: usize = 20;

static FUNCTION_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bfunction\b").expect("valid pattern"));

/// Bounded slice of a buffer sent in place of the full content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Slice text, each line newline-terminated.
    pub text: String,

    /// Buffer path relative to the project root.
    pub name: String,

    /// First line of the slice within the buffer. Must be subtracted
    /// from the cursor line before the fragment is used in a query:
    /// the server sees the slice as a document starting at line 0.
    pub offset_lines: usize,
}

/// Selects the fragment to send for a completion at `cursor_line`.
///
/// Scans the 50 lines preceding the cursor for lines containing the
/// `function` keyword and anchors the slice at the match with the
/// smallest leading indentation; among equally indented matches the
/// one closest to the cursor wins. Without a match the slice starts
/// 50 lines above the cursor. The slice ends 20 lines past the cursor,
/// clamped to the buffer.
#[must_use]
pub fn select(buffer: &BufferSnapshot, cursor_line: usize) -> Fragment {
    let lines = buffer.lines();
    let scan_start = cursor_line.saturating_sub(LOOKBACK_LINES);

    let mut min_indent: Option<usize> = None;
    let mut start: Option<usize> = None;

    for (i, line) in lines
        .iter()
        .enumerate()
        .take(cursor_line.min(lines.len()))
        .skip(scan_start)
    {
        if !FUNCTION_BOUNDARY.is_match(line) {
            continue;
        }
        let indent = leading_indent(line);
        // "<=" keeps updating on ties: the last equally indented
        // boundary in the window wins.
        if min_indent.is_none_or(|m| indent <= m) {
            min_indent = Some(indent);
            start = Some(i);
        }
    }

    let start = start.unwrap_or(scan_start);
    let last_line = lines.len().saturating_sub(1);
    let end = (cursor_line + LOOKAHEAD_LINES).min(last_line);

    Fragment {
        text: buffer.slice_text(start, end),
        name: buffer.relative_path().to_string(),
        offset_lines: start,
    }
}

fn leading_indent(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::buffer::Position;
    use proptest::prelude::*;

    fn snapshot(lines: Vec<String>, cursor_line: usize) -> BufferSnapshot {
        BufferSnapshot::new(lines, Position::new(cursor_line, 0), "app.js")
    }

    fn filler(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("var x{i} = {i};")).collect()
    }

    #[test]
    fn test_no_boundary_starts_at_lookback() {
        let buffer = snapshot(filler(300), 100);
        let fragment = select(&buffer, 100);
        assert_eq!(fragment.offset_lines, 50);
        assert_eq!(fragment.name, "app.js");
    }

    #[test]
    fn test_start_clamped_to_buffer_start() {
        let buffer = snapshot(filler(300), 10);
        let fragment = select(&buffer, 10);
        assert_eq!(fragment.offset_lines, 0);
    }

    #[test]
    fn test_boundary_with_smallest_indent_wins() {
        let mut lines = filler(300);
        lines[60] = "    function inner() {".to_string();
        lines[70] = "function outer() {".to_string();
        let buffer = snapshot(lines, 100);

        let fragment = select(&buffer, 100);
        assert_eq!(fragment.offset_lines, 70);
    }

    #[test]
    fn test_equal_indent_tie_keeps_last_match() {
        let mut lines = filler(300);
        lines[60] = "function first() {".to_string();
        lines[80] = "function second() {".to_string();
        let buffer = snapshot(lines, 100);

        // Both at indent 0: the one closest to the cursor wins.
        let fragment = select(&buffer, 100);
        assert_eq!(fragment.offset_lines, 80);
    }

    #[test]
    fn test_boundary_requires_word_match() {
        let mut lines = filler(300);
        lines[75] = "var functional = true;".to_string();
        let buffer = snapshot(lines, 100);

        // "functional" is not the token "function".
        let fragment = select(&buffer, 100);
        assert_eq!(fragment.offset_lines, 50);
    }

    #[test]
    fn test_boundary_on_cursor_line_ignored() {
        let mut lines = filler(300);
        lines[100] = "function here() {".to_string();
        let buffer = snapshot(lines, 100);

        // The scan window ends just before the cursor line.
        let fragment = select(&buffer, 100);
        assert_eq!(fragment.offset_lines, 50);
    }

    #[test]
    fn test_end_clamped_to_last_line() {
        let buffer = snapshot(filler(300), 295);
        let fragment = select(&buffer, 295);
        // Lines [245, 299), newline-terminated.
        assert_eq!(fragment.offset_lines, 245);
        assert_eq!(fragment.text.lines().count(), 54);
    }

    #[test]
    fn test_select_is_idempotent() {
        let mut lines = filler(300);
        lines[90] = "  function f() {".to_string();
        let buffer = snapshot(lines, 120);

        assert_eq!(select(&buffer, 120), select(&buffer, 120));
    }

    proptest! {
        #[test]
        fn prop_fragment_bounds(len in 251usize..600, cursor in 0usize..600) {
            let cursor = cursor.min(len - 1);
            let buffer = snapshot(filler(len), cursor);
            let fragment = select(&buffer, cursor);

            let start = fragment.offset_lines;
            let line_count = fragment.text.lines().count();
            let end = start + line_count;

            prop_assert!(start <= cursor);
            prop_assert!(end <= len);
            prop_assert!(end - start <= LOOKBACK_LINES + LOOKAHEAD_LINES + 1);
        }
    }
}
