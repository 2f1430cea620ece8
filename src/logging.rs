//! Optional file-based diagnostics.
//!
//! The library itself only emits `tracing` events and never installs a
//! subscriber on its own. Embedders that want the classic on-disk log
//! of the completion plugin call [`init_file_logging`] once at
//! startup; everything the client, sessions, and locator report then
//! lands in a timestamped file under `~/.tern-complete/logs/`.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Log files older than this are pruned at startup.
const MAX_LOG_AGE: Duration = Duration::from_secs(24 * 3600);

/// Directory where diagnostic logs are written.
#[must_use]
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tern-complete")
        .join("logs")
}

/// Installs a file-writing `tracing` subscriber and returns the path
/// of the new log file.
///
/// `level` is an `EnvFilter` directive (`info`, `tern_complete=debug`,
/// ...); the `RUST_LOG` environment variable wins when set. Stale log
/// files from earlier sessions are pruned first. Must be called at
/// most once per process.
///
/// # Errors
/// Returns error if the log directory or file cannot be created.
pub fn init_file_logging(level: &str) -> io::Result<PathBuf> {
    let dir = default_log_dir();
    fs::create_dir_all(&dir)?;

    let pruned = prune_stale_logs(&dir, MAX_LOG_AGE)?;

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("completion-{stamp}.log"));
    let file = File::create(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(file.with_max_level(tracing::Level::TRACE))
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!("diagnostics to {}", path.display());
    if pruned > 0 {
        tracing::debug!("pruned {pruned} stale log file(s)");
    }

    Ok(path)
}

/// Removes `.log` files in `dir` older than `max_age`. Returns how
/// many were removed.
fn prune_stale_logs(dir: &Path, max_age: Duration) -> io::Result<usize> {
    let now = SystemTime::now();
    let mut pruned = 0;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let expired = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .is_some_and(|age| age > max_age);

        if expired && fs::remove_file(&path).is_ok() {
            pruned += 1;
        }
    }

    Ok(pruned)
}
