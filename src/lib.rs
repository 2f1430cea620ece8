//! tern-complete
//!
//! Code-completion client for the Tern JavaScript analysis server.
//! Talks to a long-lived `tern` process over loopback HTTP, managing
//! the server's lifecycle per project root and deciding how much of
//! the edited buffer to ship with each request.
//!
//! # Architecture
//!
//! - **Project Module**: locates the `.tern-project` root that scopes
//!   one server instance
//! - **Server Module**: owns the server child process (or a port
//!   discovered from `.tern-port`) and its startup handshake
//! - **Client Module**: builds queries, performs the HTTP round-trip,
//!   and retries once through a server restart on failure
//! - **Fragment Module**: bounded buffer slices for large files
//! - **Format Module**: raw completion records to display candidates
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use tern_complete::{BufferSnapshot, CompletionClient, Position, TernConfig};
//!
//! let mut client = CompletionClient::new(TernConfig::default())
//!     .expect("HTTP client");
//! let buffer = BufferSnapshot::new(
//!     ["var x = doc."],
//!     Position::new(0, 12),
//!     "src/app.js",
//! );
//! let candidates = client
//!     .complete_candidates(Path::new("/project/src"), &buffer)
//!     .expect("non-fatal failures yield an empty list");
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod fragment;
pub mod logging;
pub mod project;
pub mod protocol;
pub mod server;
pub mod trigger;

// Re-export main types
pub use buffer::{BufferSnapshot, Position};
pub use client::CompletionClient;
pub use config::TernConfig;
pub use error::CompletionError;
pub use format::DisplayCandidate;
pub use project::ProjectLocator;
pub use protocol::CompletionRecord;
pub use server::{ServerSession, SessionState};
