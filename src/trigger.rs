//! Trigger-position heuristics.
//!
//! Given the text of the current line up to the cursor, decide where
//! the completion candidate begins. Inside an import or `require`
//! specifier the candidate starts at the opening quote; elsewhere it
//! is the trailing identifier word.

use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT_SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"=?\s*require\(["'][\w\./-]*$|\s+from\s+["'][\w\./-]*$"#)
        .expect("valid pattern")
});

static QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']"#).expect("valid pattern"));

static WORD_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w*$").expect("valid pattern"));

/// Returns whether the line prefix ends inside an import specifier.
#[must_use]
pub fn in_import_specifier(input: &str) -> bool {
    IMPORT_SPEC.is_match(input)
}

/// Returns the column where the completion candidate begins.
///
/// Inside an import specifier this is the opening quote, so the whole
/// module path is treated as the candidate; otherwise the start of the
/// trailing word (possibly the cursor column itself).
#[must_use]
pub fn complete_position(input: &str) -> Option<usize> {
    if IMPORT_SPEC.is_match(input) {
        return QUOTE.find(input).map(|m| m.start());
    }
    WORD_TAIL.find(input).map(|m| m.start())
}

/// Returns the cursor column to send to the server when completing an
/// import specifier: the end of the matched specifier rather than the
/// candidate start.
#[must_use]
pub fn import_cursor_ch(input: &str) -> Option<usize> {
    IMPORT_SPEC.find(input).map(|m| m.end())
}
