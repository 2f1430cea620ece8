//! Project root discovery.
//!
//! A project root is the nearest ancestor directory carrying the
//! `.tern-project` marker file; it scopes one analysis-server instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Marker file identifying a project root.
pub const PROJECT_MARKER: &str = ".tern-project";

/// Walks from `start_dir` up through its ancestors looking for the
/// project marker file.
///
/// The starting directory itself is checked first. Returns `None` when
/// the filesystem root is reached without a match.
#[must_use]
pub fn find_project_root(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir;
    loop {
        if dir.join(PROJECT_MARKER).is_file() {
            return Some(dir.to_path_buf());
        }
        dir = dir.parent()?;
    }
}

/// Locator with a per-starting-directory cache.
///
/// A buffer's project root is resolved once and reused for the
/// session's lifetime; negative results are cached too, so a buffer
/// outside any project does not re-walk the ancestor chain on every
/// keystroke.
#[derive(Debug, Default)]
pub struct ProjectLocator {
    cache: HashMap<PathBuf, Option<PathBuf>>,
}

impl ProjectLocator {
    /// Creates an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the project root for a buffer directory, caching the
    /// result.
    pub fn locate(&mut self, start_dir: &Path) -> Option<PathBuf> {
        if let Some(cached) = self.cache.get(start_dir) {
            return cached.clone();
        }

        let found = find_project_root(start_dir);
        match &found {
            Some(root) => debug!("project root for {}: {}", start_dir.display(), root.display()),
            None => debug!("no project marker above {}", start_dir.display()),
        }

        self.cache.insert(start_dir.to_path_buf(), found.clone());
        found
    }

    /// Drops all cached results.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
