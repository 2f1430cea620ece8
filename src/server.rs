//! Analysis-server session management.
//!
//! A session owns at most one server child process for a project root:
//! it spawns the process, reads the startup port announcement, and
//! tears the process down again. A session may instead represent a
//! server another tool already launched, discovered through the
//! on-disk port file; such a server is never stopped by us.

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::TernConfig;
use crate::error::CompletionError;

/// Name of the on-disk port file written by an externally managed
/// server.
pub const PORT_FILE: &str = ".tern-port";

static PORT_ANNOUNCEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Listening on port (\d+)").expect("valid pattern"));

/// Lifecycle states for an analysis-server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No start attempted yet.
    Unstarted,
    /// Spawned, waiting for the port announcement.
    Starting,
    /// Port known, requests can be issued.
    Listening,
    /// Stopped after owning a process.
    Stopped,
    /// The last start attempt failed; startable again after the
    /// cool-down window.
    StartFailed,
}

/// Owns one analysis-server process (or an externally published port)
/// for a project root.
pub struct ServerSession {
    project_root: PathBuf,
    config: TernConfig,
    state: SessionState,
    process: Option<Child>,
    port: Option<u16>,
    last_failed: Option<Instant>,
}

impl ServerSession {
    /// Creates an unstarted session for a project root.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, config: TernConfig) -> Self {
        Self {
            project_root: project_root.into(),
            config,
            state: SessionState::Unstarted,
            process: None,
            port: None,
            last_failed: None,
        }
    }

    /// Returns the session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the listening port, if known.
    #[must_use]
    pub const fn current_port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the project root this session is bound to.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Returns whether this session owns a child process.
    #[must_use]
    pub const fn owns_process(&self) -> bool {
        self.process.is_some()
    }

    /// Ensures a server is available and returns its port.
    ///
    /// No-op when already `Starting` or `Listening`. Reads the port
    /// file when present (externally managed server, no owned
    /// process); otherwise spawns the configured binary and waits for
    /// its port announcement under the startup deadline. A start
    /// attempt inside the post-failure cool-down is skipped with
    /// `NotReady` instead of retried.
    pub fn ensure_started(&mut self) -> Result<u16, CompletionError> {
        if matches!(self.state, SessionState::Starting | SessionState::Listening) {
            if let Some(port) = self.port {
                return Ok(port);
            }
        }

        if self.in_cooldown() {
            debug!(
                "start skipped for {}: inside cool-down",
                self.project_root.display()
            );
            return Err(CompletionError::NotReady);
        }

        let port_file = self.project_root.join(PORT_FILE);
        if port_file.is_file() {
            let port = read_port_file(&port_file)?;
            info!(
                "using externally managed server on port {} for {}",
                port,
                self.project_root.display()
            );
            self.state = SessionState::Listening;
            self.process = None;
            self.port = Some(port);
            return Ok(port);
        }

        self.spawn_server()
    }

    /// Stops the owned server process: closes its stdin and waits for
    /// exit. Full no-op when no process is owned, including sessions
    /// discovered through a port file. Idempotent.
    pub fn stop(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };

        debug!("stopping server for {}", self.project_root.display());
        drop(child.stdin.take());
        if let Err(err) = child.wait() {
            warn!("error waiting for server exit: {err}");
        }

        self.port = None;
        self.state = SessionState::Stopped;
    }

    /// Restarts the session for the retry path: stops an owned
    /// process, forgets the cached port, and runs `ensure_started`
    /// again. For a port-file session this re-reads the port file; the
    /// file itself and the foreign server are left alone.
    pub fn restart(&mut self) -> Result<u16, CompletionError> {
        self.stop();
        self.state = SessionState::Unstarted;
        self.port = None;
        self.ensure_started()
    }

    fn in_cooldown(&self) -> bool {
        self.last_failed
            .is_some_and(|at| at.elapsed() < self.config.start_cooldown)
    }

    fn spawn_server(&mut self) -> Result<u16, CompletionError> {
        self.config.validate()?;

        let path = self.config.child_path(std::env::var_os("PATH").as_deref());

        info!(
            "starting {} {} in {}",
            self.config.command,
            self.config.args.join(" "),
            self.project_root.display()
        );

        let spawned = Command::new(&self.config.command)
            .args(&self.config.args)
            .current_dir(&self.project_root)
            .env("PATH", path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                self.fail_start();
                return Err(CompletionError::StartFailed(format!(
                    "could not spawn {}: {err}",
                    self.config.command
                )));
            }
        };

        self.state = SessionState::Starting;

        match self.await_port_announcement(&mut child) {
            Ok(port) => {
                info!("server listening on port {port}");
                self.process = Some(child);
                self.port = Some(port);
                self.state = SessionState::Listening;
                Ok(port)
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                self.fail_start();
                Err(err)
            }
        }
    }

    /// Reads the child's combined stdout and stderr line by line until
    /// the port announcement appears, the streams close, or the
    /// startup deadline passes. Lines before the announcement are
    /// accumulated as diagnostic output and reported on failure.
    fn await_port_announcement(&self, child: &mut Child) -> Result<u16, CompletionError> {
        let (tx, rx) = mpsc::channel::<String>();

        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, tx.clone());
        }
        // Readers hold the only remaining senders; the channel
        // disconnects once both streams close.
        drop(tx);

        let deadline = Instant::now() + self.config.startup_timeout;
        let mut output = String::new();

        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Err(CompletionError::StartFailed(start_error(
                    "timed out waiting for port announcement",
                    &output,
                )));
            };

            match rx.recv_timeout(remaining) {
                Ok(line) => {
                    if let Some(port) = parse_port_announcement(&line) {
                        return Ok(port);
                    }
                    debug!("server startup output: {line}");
                    output.push_str(&line);
                    output.push('\n');
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(CompletionError::StartFailed(start_error(
                        "timed out waiting for port announcement",
                        &output,
                    )));
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(CompletionError::StartFailed(start_error(
                        "server exited before announcing a port",
                        &output,
                    )));
                }
            }
        }
    }

    fn fail_start(&mut self) {
        self.state = SessionState::StartFailed;
        self.last_failed = Some(Instant::now());
        self.port = None;
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl std::fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSession")
            .field("project_root", &self.project_root)
            .field("state", &self.state)
            .field("port", &self.port)
            .field("owns_process", &self.process.is_some())
            .finish()
    }
}

/// Parses a startup output line into the announced port.
#[must_use]
pub fn parse_port_announcement(line: &str) -> Option<u16> {
    PORT_ANNOUNCEMENT
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn start_error(reason: &str, output: &str) -> String {
    if output.is_empty() {
        reason.to_string()
    } else {
        format!("{reason}:\n{output}")
    }
}

fn read_port_file(path: &Path) -> Result<u16, CompletionError> {
    let content = fs::read_to_string(path)?;
    content
        .trim()
        .parse()
        .map_err(|_| CompletionError::Protocol(format!("invalid port file: {}", path.display())))
}

fn spawn_line_reader(stream: impl Read + Send + 'static, tx: mpsc::Sender<String>) {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                // Handshake finished; nobody is listening anymore.
                break;
            }
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> TernConfig {
        TernConfig::default().with_startup_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_parse_port_announcement() {
        assert_eq!(parse_port_announcement("Listening on port 43123"), Some(43123));
        assert_eq!(parse_port_announcement("Listening on port 80 extra"), Some(80));
        assert_eq!(parse_port_announcement("warning: something"), None);
        assert_eq!(parse_port_announcement("prefix Listening on port 80"), None);
    }

    #[test]
    fn test_port_file_discovery_owns_no_process() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PORT_FILE), "7654\n").unwrap();

        let mut session = ServerSession::new(dir.path(), config());
        let port = session.ensure_started().unwrap();

        assert_eq!(port, 7654);
        assert_eq!(session.state(), SessionState::Listening);
        assert!(!session.owns_process());

        // stop() must not touch a server we do not own.
        session.stop();
        assert_eq!(session.state(), SessionState::Listening);
        assert_eq!(session.current_port(), Some(7654));
    }

    #[test]
    fn test_invalid_port_file_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PORT_FILE), "not a port").unwrap();

        let mut session = ServerSession::new(dir.path(), config());
        let err = session.ensure_started().unwrap_err();
        assert!(matches!(err, CompletionError::Protocol(_)));
    }

    #[test]
    fn test_empty_command_is_fatal_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ServerSession::new(dir.path(), config().with_command(""));

        let err = session.ensure_started().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_stop_is_idempotent_without_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ServerSession::new(dir.path(), config());

        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Unstarted);
    }

    #[cfg(unix)]
    #[test]
    fn test_handshake_parses_announced_port() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config()
            .with_command("sh")
            .with_args(["-c", "echo 'Listening on port 43123'; exec cat"]);

        let mut session = ServerSession::new(dir.path(), cfg);
        let port = session.ensure_started().unwrap();

        assert_eq!(port, 43123);
        assert_eq!(session.state(), SessionState::Listening);
        assert!(session.owns_process());

        // Second call is a no-op on the running session.
        assert_eq!(session.ensure_started().unwrap(), 43123);

        // Closing stdin lets `cat` exit; stop() waits for it.
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.current_port(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_diagnostic_lines_accumulate_before_announcement() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config().with_command("sh").with_args([
            "-c",
            "echo 'warming up'; echo 'Listening on port 50012'; exec cat",
        ]);

        let mut session = ServerSession::new(dir.path(), cfg);
        assert_eq!(session.ensure_started().unwrap(), 50012);
        session.stop();
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_without_announcement_fails_and_cools_down() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config()
            .with_command("sh")
            .with_args(["-c", "echo 'npm: command not found'; exit 1"]);

        let mut session = ServerSession::new(dir.path(), cfg);
        let err = session.ensure_started().unwrap_err();

        match err {
            CompletionError::StartFailed(detail) => {
                assert!(detail.contains("npm: command not found"));
            }
            other => panic!("expected StartFailed, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::StartFailed);

        // Immediately retrying inside the cool-down must not spawn a
        // second process.
        let err = session.ensure_started().unwrap_err();
        assert!(matches!(err, CompletionError::NotReady));
    }

    #[cfg(unix)]
    #[test]
    fn test_hanging_child_hits_startup_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TernConfig::default()
            .with_startup_timeout(Duration::from_millis(200))
            .with_command("sh")
            .with_args(["-c", "exec sleep 30"]);

        let mut session = ServerSession::new(dir.path(), cfg);
        let err = session.ensure_started().unwrap_err();

        match err {
            CompletionError::StartFailed(detail) => assert!(detail.contains("timed out")),
            other => panic!("expected StartFailed, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::StartFailed);
        assert!(!session.owns_process());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_binary_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config().with_command("definitely-not-a-real-binary");

        let mut session = ServerSession::new(dir.path(), cfg);
        let err = session.ensure_started().unwrap_err();
        assert!(matches!(err, CompletionError::StartFailed(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_port_file_restart_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PORT_FILE), "7000").unwrap();

        let mut session = ServerSession::new(dir.path(), config());
        assert_eq!(session.ensure_started().unwrap(), 7000);

        // An external restart rewrote the file; restart() picks the
        // new port up without touching the file.
        fs::write(dir.path().join(PORT_FILE), "7001").unwrap();
        assert_eq!(session.restart().unwrap(), 7001);
        assert!(fs::read_to_string(dir.path().join(PORT_FILE)).is_ok());
    }
}
