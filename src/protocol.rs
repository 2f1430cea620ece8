//! Wire types for the analysis-server HTTP/JSON protocol.
//!
//! The server accepts `POST /` with a body of `{query, files}` and
//! answers a completions query with `{completions: [...]}`. Field
//! names follow the server's camelCase conventions.

use serde::{Deserialize, Serialize};

use crate::buffer::Position;

/// Synthetic file key referencing the first attached file entry.
pub const INLINE_FILE: &str = "#0";

/// A completion query as the analysis server expects it.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    /// Query type tag.
    #[serde(rename = "type")]
    pub query_type: &'static str,

    /// Include type strings in the results.
    pub types: bool,

    /// Include documentation strings in the results.
    pub docs: bool,

    /// Positions are `{line, ch}` objects rather than offsets.
    #[serde(rename = "lineCharPositions")]
    pub line_char_positions: bool,

    /// Keep `Object.prototype` members in the results.
    #[serde(rename = "omitObjectPrototype")]
    pub omit_object_prototype: bool,

    /// Let the editor side handle ordering.
    pub sort: bool,

    /// Target file: a relative path the server already knows, or the
    /// inline key `#0`.
    pub file: String,

    /// Cursor position in the coordinate space of the sent text.
    pub end: Position,
}

impl Query {
    /// Builds a completions query with the fixed option flags.
    #[must_use]
    pub fn completions(file: impl Into<String>, end: Position) -> Self {
        Self {
            query_type: "completions",
            types: true,
            docs: true,
            line_char_positions: true,
            omit_object_prototype: false,
            sort: false,
            file: file.into(),
            end,
        }
    }
}

/// One file shipped alongside a query.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    /// Entry type: `full` or `part`.
    #[serde(rename = "type")]
    pub entry_type: &'static str,

    /// Buffer path relative to the project root.
    pub name: String,

    /// File text, newline-terminated lines.
    pub text: String,

    /// First line of a `part` entry within the real buffer.
    #[serde(rename = "offsetLines", skip_serializing_if = "Option::is_none")]
    pub offset_lines: Option<usize>,
}

impl FileEntry {
    /// Creates a full-buffer entry.
    #[must_use]
    pub fn full(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            entry_type: "full",
            name: name.into(),
            text: text.into(),
            offset_lines: None,
        }
    }

    /// Creates a partial-buffer entry starting at `offset_lines`.
    #[must_use]
    pub fn part(name: impl Into<String>, text: impl Into<String>, offset_lines: usize) -> Self {
        Self {
            entry_type: "part",
            name: name.into(),
            text: text.into(),
            offset_lines: Some(offset_lines),
        }
    }
}

/// Request document: a query plus its attached files.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDoc {
    /// The query object.
    pub query: Query,

    /// Files attached to this request (empty for filename-only
    /// references).
    pub files: Vec<FileEntry>,
}

/// One raw completion candidate from the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletionRecord {
    /// Completion name.
    pub name: String,

    /// Type string, e.g. `fn(a: number) -> string` or `?`.
    #[serde(rename = "type", default)]
    pub ty: Option<String>,

    /// Documentation string.
    #[serde(default)]
    pub doc: Option<String>,
}

/// Response body for a completions query.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionsResponse {
    /// Completion candidates, possibly empty.
    #[serde(default)]
    pub completions: Vec<CompletionRecord>,
}
