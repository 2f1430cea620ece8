//! Completion client: one session per project root, one request at a
//! time.
//!
//! Builds the completion query, decides how much buffer text to ship,
//! performs the HTTP round-trip, and drives the single
//! restart-and-retry on failure. Non-fatal failures degrade to an
//! empty candidate list; only configuration errors abort.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::buffer::{BufferSnapshot, Position};
use crate::config::TernConfig;
use crate::error::CompletionError;
use crate::format::{self, DisplayCandidate};
use crate::fragment::{self, FRAGMENT_THRESHOLD};
use crate::project::ProjectLocator;
use crate::protocol::{
    CompletionRecord, CompletionsResponse, FileEntry, INLINE_FILE, Query, RequestDoc,
};
use crate::server::ServerSession;

/// One project's server session plus the request state tied to it.
struct ProjectSession {
    server: ServerSession,
    /// Whether the server has received the full buffer once this
    /// session.
    full_buffer_sent: bool,
}

/// Issues completion queries against per-project analysis-server
/// sessions.
///
/// Each project root owns an independent [`ServerSession`]; sessions
/// are created lazily on the first request for their root and reused
/// afterwards. Requests are synchronous and serialized by the caller
/// (one per completion trigger).
pub struct CompletionClient {
    config: TernConfig,
    http: reqwest::blocking::Client,
    locator: ProjectLocator,
    sessions: HashMap<PathBuf, ProjectSession>,
}

impl CompletionClient {
    /// Creates a client from a configuration.
    ///
    /// The HTTP client is direct-connection only: system proxy
    /// settings are bypassed, and every request is bounded by the
    /// configured timeout.
    pub fn new(config: TernConfig) -> Result<Self, CompletionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            config,
            http,
            locator: ProjectLocator::new(),
            sessions: HashMap::new(),
        })
    }

    /// Computes completion records for a buffer.
    ///
    /// `buffer_dir` is the absolute directory of the buffer's file,
    /// used to resolve the project root. Without a project marker the
    /// result is an empty list and nothing is spawned. All non-fatal
    /// failures also yield an empty list; only configuration errors
    /// are returned as `Err`.
    pub fn complete(
        &mut self,
        buffer_dir: &Path,
        buffer: &BufferSnapshot,
    ) -> Result<Vec<CompletionRecord>, CompletionError> {
        match self.try_complete(buffer_dir, buffer) {
            Ok(records) => Ok(records),
            Err(err) if err.is_fatal() => Err(err),
            Err(CompletionError::ProjectNotFound) => {
                debug!(
                    "completion disabled: no project for {}",
                    buffer_dir.display()
                );
                Ok(Vec::new())
            }
            Err(err) => {
                warn!("completion request failed: {err}");
                Ok(Vec::new())
            }
        }
    }

    /// The fallible request cycle behind [`complete`](Self::complete).
    fn try_complete(
        &mut self,
        buffer_dir: &Path,
        buffer: &BufferSnapshot,
    ) -> Result<Vec<CompletionRecord>, CompletionError> {
        let root = self
            .locator
            .locate(buffer_dir)
            .ok_or(CompletionError::ProjectNotFound)?;

        let entry = self
            .sessions
            .entry(root.clone())
            .or_insert_with(|| ProjectSession {
                server: ServerSession::new(root, self.config.clone()),
                full_buffer_sent: false,
            });

        let (doc, sent_full) = build_request(buffer, entry.full_buffer_sent);

        // Explicit two-attempt loop: attempt, on failure restart the
        // session once and attempt again with the identical document.
        let records = match attempt(&self.http, &self.config, &mut entry.server, &doc) {
            Ok(records) => records,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("completion request failed, restarting server: {err}");
                entry.server.restart()?;
                attempt(&self.http, &self.config, &mut entry.server, &doc)?
            }
        };

        if sent_full {
            entry.full_buffer_sent = true;
        }
        Ok(records)
    }

    /// Computes display-ready candidates for a buffer.
    pub fn complete_candidates(
        &mut self,
        buffer_dir: &Path,
        buffer: &BufferSnapshot,
    ) -> Result<Vec<DisplayCandidate>, CompletionError> {
        let records = self.complete(buffer_dir, buffer)?;
        Ok(records.iter().map(format::format).collect())
    }

    /// Returns the session state for a project root, if one exists.
    #[must_use]
    pub fn session(&self, project_root: &Path) -> Option<&ServerSession> {
        self.sessions.get(project_root).map(|entry| &entry.server)
    }

    /// Stops every owned server session. Called on the editor-close
    /// event; port-file sessions are left running.
    pub fn shutdown(&mut self) {
        for entry in self.sessions.values_mut() {
            entry.server.stop();
        }
    }
}

impl Drop for CompletionClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decides what buffer text to attach and builds the request document.
///
/// Returns the document and whether it carries the full buffer. In
/// priority order: an unchanged buffer whose full content the server
/// already holds is referenced by filename alone; a buffer past the
/// size threshold ships a fragment with the cursor rebased into
/// fragment coordinates; anything else ships the full buffer inline.
fn build_request(buffer: &BufferSnapshot, full_buffer_sent: bool) -> (RequestDoc, bool) {
    let cursor = buffer.cursor();

    if !buffer.changed() && full_buffer_sent {
        let query = Query::completions(buffer.relative_path(), cursor);
        return (
            RequestDoc {
                query,
                files: Vec::new(),
            },
            false,
        );
    }

    if buffer.line_count() > FRAGMENT_THRESHOLD {
        let frag = fragment::select(buffer, cursor.line);
        let end = Position::new(cursor.line - frag.offset_lines, cursor.ch);
        let files = vec![FileEntry::part(frag.name, frag.text, frag.offset_lines)];
        return (
            RequestDoc {
                query: Query::completions(INLINE_FILE, end),
                files,
            },
            false,
        );
    }

    let files = vec![FileEntry::full(buffer.relative_path(), buffer.full_text())];
    (
        RequestDoc {
            query: Query::completions(INLINE_FILE, cursor),
            files,
        },
        true,
    )
}

/// One request attempt: ensure the session has a port, POST the
/// document, parse the response body.
fn attempt(
    http: &reqwest::blocking::Client,
    config: &TernConfig,
    server: &mut ServerSession,
    doc: &RequestDoc,
) -> Result<Vec<CompletionRecord>, CompletionError> {
    let port = server.ensure_started()?;
    let url = format!("http://{}:{}/", config.host(), port);

    let response = http.post(&url).json(doc).send()?.error_for_status()?;
    let body = response.text()?;

    let parsed: CompletionsResponse = serde_json::from_str(&body)
        .map_err(|err| CompletionError::Protocol(format!("unexpected response body: {err}")))?;

    debug!("{} completions from {url}", parsed.completions.len());
    Ok(parsed.completions)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn small_buffer(changed: bool) -> BufferSnapshot {
        let lines: Vec<String> = (0..10).map(|i| format!("var line{i};")).collect();
        BufferSnapshot::new(lines, Position::new(4, 3), "src/app.js").with_changed(changed)
    }

    fn large_buffer() -> BufferSnapshot {
        let mut lines: Vec<String> = (0..400).map(|i| format!("var line{i};")).collect();
        lines[260] = "function outer() {".to_string();
        BufferSnapshot::new(lines, Position::new(300, 7), "src/big.js")
    }

    #[test]
    fn test_build_request_full_buffer_first_time() {
        let (doc, sent_full) = build_request(&small_buffer(true), false);

        assert!(sent_full);
        assert_eq!(doc.query.file, INLINE_FILE);
        assert_eq!(doc.query.end, Position::new(4, 3));
        assert_eq!(doc.files.len(), 1);
        assert_eq!(doc.files[0].entry_type, "full");
        assert_eq!(doc.files[0].name, "src/app.js");
    }

    #[test]
    fn test_build_request_filename_reference_when_unchanged() {
        let (doc, sent_full) = build_request(&small_buffer(false), true);

        assert!(!sent_full);
        assert_eq!(doc.query.file, "src/app.js");
        assert!(doc.files.is_empty());
    }

    #[test]
    fn test_build_request_changed_buffer_resends_full() {
        // A changed buffer is resent even after a prior full send.
        let (doc, sent_full) = build_request(&small_buffer(true), true);

        assert!(sent_full);
        assert_eq!(doc.query.file, INLINE_FILE);
        assert_eq!(doc.files.len(), 1);
    }

    #[test]
    fn test_build_request_fragment_for_large_buffer() {
        let (doc, sent_full) = build_request(&large_buffer(), false);

        assert!(!sent_full);
        assert_eq!(doc.query.file, INLINE_FILE);
        assert_eq!(doc.files.len(), 1);
        assert_eq!(doc.files[0].entry_type, "part");
        assert_eq!(doc.files[0].offset_lines, Some(260));
        // Cursor rebased into fragment coordinates.
        assert_eq!(doc.query.end, Position::new(40, 7));
    }

    #[test]
    fn test_build_request_unchanged_large_buffer_prefers_filename() {
        let buffer = large_buffer().with_changed(false);
        let (doc, _) = build_request(&buffer, true);

        assert_eq!(doc.query.file, "src/big.js");
        assert!(doc.files.is_empty());
    }
}
