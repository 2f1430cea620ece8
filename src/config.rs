//! Analysis-server configuration.
//!
//! Defines how the Tern server binary is located and launched, and the
//! timeouts that bound each phase of a completion request.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// Default server command.
pub const DEFAULT_COMMAND: &str = "tern";

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on the startup handshake read.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cool-down after a failed server start.
pub const DEFAULT_START_COOLDOWN: Duration = Duration::from_secs(30);

/// Configuration for launching and querying the analysis server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TernConfig {
    /// Server executable command.
    pub command: String,

    /// Command-line arguments.
    pub args: Vec<String>,

    /// Installation root whose `node_modules/.bin` is appended to
    /// `PATH` for the child process. Optional; when set, the directory
    /// must exist.
    pub install_dir: Option<PathBuf>,

    /// HTTP request timeout.
    pub request_timeout: Duration,

    /// Maximum time to wait for the startup port announcement.
    pub startup_timeout: Duration,

    /// Cool-down window after a failed start attempt.
    pub start_cooldown: Duration,
}

impl Default for TernConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: vec!["--persistent".to_string()],
            install_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            start_cooldown: DEFAULT_START_COOLDOWN,
        }
    }
}

impl TernConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Sets the command-line arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the installation root containing bundled node binaries.
    #[must_use]
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the startup handshake timeout.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Sets the post-failure start cool-down.
    #[must_use]
    pub const fn with_start_cooldown(mut self, cooldown: Duration) -> Self {
        self.start_cooldown = cooldown;
        self
    }

    /// Returns the loopback host to connect to.
    ///
    /// Windows resolvers occasionally mishandle `localhost`, so the
    /// numeric address is used there.
    #[must_use]
    pub fn host(&self) -> &'static str {
        if cfg!(windows) { "127.0.0.1" } else { "localhost" }
    }

    /// Returns the bundled-binaries directory, if an install root is
    /// configured.
    #[must_use]
    pub fn bin_dir(&self) -> Option<PathBuf> {
        self.install_dir
            .as_ref()
            .map(|dir| dir.join("node_modules").join(".bin"))
    }

    /// Validates that the configuration can launch a server.
    ///
    /// A missing command or a configured install root without its
    /// `node_modules/.bin` directory is a fatal configuration error.
    pub fn validate(&self) -> Result<(), CompletionError> {
        if self.command.is_empty() {
            return Err(CompletionError::Config(
                "no server command configured".to_string(),
            ));
        }

        if let Some(bin_dir) = self.bin_dir() {
            if !bin_dir.is_dir() {
                return Err(CompletionError::Config(format!(
                    "bundled binaries directory missing: {}",
                    bin_dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Returns the `PATH` value for the child process, with the
    /// bundled-binaries directory appended when configured.
    pub fn child_path(&self, current: Option<&std::ffi::OsStr>) -> std::ffi::OsString {
        let mut paths: Vec<PathBuf> = current
            .map(|p| std::env::split_paths(p).collect())
            .unwrap_or_default();

        if let Some(bin_dir) = self.bin_dir() {
            paths.push(bin_dir);
        }

        std::env::join_paths(paths).unwrap_or_default()
    }
}
