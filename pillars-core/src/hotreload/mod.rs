//! Loot-file hot reload.
//!
//! A `notify` watcher on the loot file's directory forwards filesystem events
//! over a channel. The owner polls it from the main context once per tick and
//! reloads the loot tables when the file was written.
//!
//! ```text
//! notify thread ── Event ──► mpsc ──► LootWatcher::poll() ──► Session::reload_loot_file
//! ```

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use tracing::{error, info, warn};

use crate::loot::{LoadReport, LootError};

#[derive(Debug, thiserror::Error)]
pub enum HotReloadError {
    #[error("loot file {0} has no parent directory")]
    NoParent(PathBuf),
    #[error("file watcher failed: {0}")]
    Watcher(#[from] notify::Error),
}

/// Reload bookkeeping, reported by the status API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotReloadStatus {
    pub enabled: bool,
    pub watched_file: Option<String>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_error: Option<String>,
}

impl HotReloadStatus {
    /// Fold the result of one reload attempt into the status
    pub fn record(&mut self, result: &Result<LoadReport, LootError>) {
        match result {
            Ok(report) => {
                self.reload_count += 1;
                self.last_reload_success = true;
                self.last_error = None;
                info!(
                    tables = report.tables,
                    entries = report.entries,
                    dropped = report.dropped,
                    count = self.reload_count,
                    "loot tables hot-reloaded"
                );
            }
            Err(e) => {
                self.last_reload_success = false;
                self.last_error = Some(e.to_string());
                error!(error = %e, "loot hot-reload failed, keeping previous tables");
            }
        }
    }
}

/// Filesystem watch on one loot file
pub struct LootWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
    path: PathBuf,
    status: HotReloadStatus,
}

impl std::fmt::Debug for LootWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LootWatcher")
            .field("path", &self.path)
            .field("status", &self.status)
            .finish()
    }
}

impl LootWatcher {
    /// Watch `path`. The file itself may not exist yet; its directory must.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, HotReloadError> {
        let path = path.into();
        let dir = match path.parent() {
            Some(dir) if dir.as_os_str().is_empty() => Path::new("."),
            Some(dir) => dir,
            None => return Err(HotReloadError::NoParent(path)),
        };

        let (tx, receiver) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "loot hot-reload enabled");

        let status = HotReloadStatus {
            enabled: true,
            watched_file: Some(path.display().to_string()),
            ..HotReloadStatus::default()
        };
        Ok(Self {
            _watcher: watcher,
            receiver,
            path,
            status,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn status(&self) -> &HotReloadStatus {
        &self.status
    }

    /// Drain pending events; true if the loot file was written since the last poll
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(event) => changed |= is_loot_modify_event(&event, &self.path),
                Err(e) => warn!(error = %e, "file watcher error"),
            }
        }
        changed
    }
}

/// A content write or creation that touches `watched`
pub fn is_loot_modify_event(event: &Event, watched: &Path) -> bool {
    let relevant = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == watched.file_name())
}
