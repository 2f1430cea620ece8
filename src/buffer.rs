//! Buffer snapshot types supplied by the editor integration.
//!
//! A snapshot is read-only from the completion core's side; the editor
//! rebuilds it per request.

use serde::{Deserialize, Serialize};

/// Cursor position in the server's coordinate space (0-indexed line
/// and character).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number, 0-indexed.
    pub line: usize,
    /// Character offset within the line.
    pub ch: usize,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

/// Read-only snapshot of an editor buffer for one completion request.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    /// Buffer lines, without trailing newlines.
    lines: Vec<String>,

    /// Cursor position.
    cursor: Position,

    /// Whether the buffer changed since the last request.
    changed: bool,

    /// Buffer path relative to the project root.
    relative_path: String,
}

impl BufferSnapshot {
    /// Creates a new snapshot. The `changed` flag defaults to true,
    /// matching a buffer the server has never seen.
    #[must_use]
    pub fn new(
        lines: impl IntoIterator<Item = impl Into<String>>,
        cursor: Position,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            cursor,
            changed: true,
            relative_path: relative_path.into(),
        }
    }

    /// Sets the "changed since last request" flag.
    #[must_use]
    pub const fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// Returns the buffer lines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns the number of lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the cursor position.
    #[must_use]
    pub const fn cursor(&self) -> Position {
        self.cursor
    }

    /// Returns whether the buffer changed since the last request.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.changed
    }

    /// Returns the buffer path relative to the project root.
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Returns lines `[start, end)` as one string, each line
    /// newline-terminated.
    #[must_use]
    pub fn slice_text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.lines.len());
        let mut text = String::new();
        for line in &self.lines[start.min(end)..end] {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    /// Returns the whole buffer as one newline-terminated string.
    #[must_use]
    pub fn full_text(&self) -> String {
        self.slice_text(0, self.lines.len())
    }
}
