//! Formatting raw completion records into display candidates.
//!
//! Pure and stateless: the mapping from the server's `{name, type,
//! doc}` records to what the editor shows in its completion menu.

use serde::Serialize;

use crate::protocol::CompletionRecord;

/// Source tag shown next to candidates in the completion menu.
pub const MENU_MARK: &str = "[ternjs] ";

/// Display-ready completion candidate for the editor UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayCandidate {
    /// Text inserted on acceptance.
    pub word: String,

    /// Abbreviation shown in the menu; for functions, the full
    /// signature with the record name in place of `fn`.
    pub abbr: String,

    /// Kind icon, e.g. `(fn)` or `(str)`.
    pub kind: String,

    /// Menu source tag.
    pub menu: String,

    /// Preview text: type string and documentation.
    pub info: String,

    /// Whether equal words from other sources may coexist.
    pub dup: bool,
}

/// Selects the kind icon for a type string.
#[must_use]
pub fn completion_icon(ty: Option<&str>) -> String {
    match ty {
        None | Some("?") => "(?)".to_string(),
        Some(t) if t.starts_with("fn(") => "(fn)".to_string(),
        Some(t) if t.starts_with('[') => format!("({t})"),
        Some("number") => "(num)".to_string(),
        Some("string") => "(str)".to_string(),
        Some("bool") => "(bool)".to_string(),
        Some(_) => "(obj)".to_string(),
    }
}

/// Builds the preview text: the type string (when present and not
/// `?`) newline-joined with the doc string, a single space standing
/// in for a missing doc.
#[must_use]
pub fn type_doc(record: &CompletionRecord) -> String {
    let doc = record.doc.as_deref().unwrap_or(" ");
    match record.ty.as_deref() {
        Some(ty) if ty != "?" => format!("{ty}\n{doc}"),
        _ => doc.to_string(),
    }
}

/// Maps a raw completion record into a display candidate.
#[must_use]
pub fn format(record: &CompletionRecord) -> DisplayCandidate {
    let kind = completion_icon(record.ty.as_deref());

    let abbr = if kind == "(fn)" {
        record
            .ty
            .as_deref()
            .unwrap_or_default()
            .replacen("fn", &record.name, 1)
    } else {
        record.name.clone()
    };

    DisplayCandidate {
        word: record.name.clone(),
        abbr,
        kind,
        menu: MENU_MARK.to_string(),
        info: type_doc(record),
        dup: true,
    }
}
