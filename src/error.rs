//! Error types for the completion pipeline.
//!
//! Only configuration errors are fatal; every other failure degrades to
//! an empty candidate list at the client boundary.

use thiserror::Error;

/// Completion pipeline error types.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Missing or unusable server configuration. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No project marker file anywhere above the buffer's directory.
    #[error("No project marker found above the buffer directory")]
    ProjectNotFound,

    /// The server process exited or hung before announcing its port.
    #[error("Server failed to start: {0}")]
    StartFailed(String),

    /// A start attempt was skipped inside the post-failure cool-down.
    #[error("Server not ready: start skipped during cool-down")]
    NotReady,

    /// Connection refused, timeout, or HTTP error status.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a body we could not make sense of.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON serialization failure on the request side.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem or process I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompletionError {
    /// Returns whether this error must abort completion entirely.
    ///
    /// Non-fatal errors are reported on the diagnostic channel and
    /// yield an empty candidate list instead of propagating.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
