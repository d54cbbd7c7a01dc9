//! Lazy file-handle management for file-backed partitions
//!
//! The keeper owns at most one open handle to the pack on disk. A handle may
//! be closed once the partition has gone quiescent and the backing file has
//! been replaced; reopening is only allowed while the on-disk mtime still
//! matches the one recorded when the pack was parsed, otherwise the
//! partition must rebuild its metadata first.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::error::Result;

/// Idle period before the sweep may close a handle
pub(crate) const HANDLE_IDLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of [`FileKeeper::ensure_open`].
pub(crate) enum HandleStatus {
    /// The handle is open and matches the recorded mtime.
    Open,
    /// The on-disk file changed (or vanished) since the metadata was parsed;
    /// the owner must rebuild the partition before reopening.
    Stale,
}

pub(crate) struct FileKeeper {
    path: PathBuf,
    file: Option<File>,
    /// On-disk modification time recorded when the pack was parsed.
    /// `None` when the file could not be stat'ed.
    mtime: Option<SystemTime>,
}

impl FileKeeper {
    pub fn new(path: PathBuf, file: File, mtime: Option<SystemTime>) -> Self {
        Self {
            path,
            file: Some(file),
            mtime,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn file_mut(&mut self) -> Option<&mut File> {
        self.file.as_mut()
    }

    /// Open the backing file if it is currently closed.
    ///
    /// Reopening silently against a mutated file would hand out blobs that no
    /// longer match the in-memory metadata, so a changed mtime reports
    /// [`HandleStatus::Stale`] instead.
    pub fn ensure_open(&mut self) -> Result<HandleStatus> {
        if self.file.is_some() {
            return Ok(HandleStatus::Open);
        }

        let on_disk = current_mtime(&self.path);
        if on_disk.is_none() || on_disk != self.mtime {
            return Ok(HandleStatus::Stale);
        }

        self.file = Some(File::open(&self.path)?);
        tracing::debug!("reopened pack handle for {:?}", self.path);
        Ok(HandleStatus::Open)
    }

    /// Close the handle if the partition has been idle past
    /// [`HANDLE_IDLE_TIMEOUT`] and the on-disk mtime no longer matches.
    ///
    /// A stable file keeps its handle indefinitely.
    pub fn close_if_idle(&mut self, now: Instant, last_access: Instant) {
        if self.file.is_none() {
            return;
        }
        if now.saturating_duration_since(last_access) <= HANDLE_IDLE_TIMEOUT {
            return;
        }
        if current_mtime(&self.path) != self.mtime {
            tracing::debug!("closing idle pack handle for {:?}", self.path);
            self.file = None;
        }
    }

    pub fn close(&mut self) {
        self.file = None;
    }
}

pub(crate) fn current_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn keeper_for(path: &Path) -> FileKeeper {
        let file = File::open(path).unwrap();
        let mtime = file.metadata().unwrap().modified().ok();
        FileKeeper::new(path.to_owned(), file, mtime)
    }

    #[test]
    fn idle_close_requires_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stable.fs8");
        std::fs::write(&path, b"payload").unwrap();

        let mut keeper = keeper_for(&path);
        let opened_at = Instant::now();

        // Not idle long enough: stays open.
        keeper.close_if_idle(opened_at, opened_at);
        assert!(keeper.is_open());

        // Idle but unchanged on disk: stays open.
        keeper.close_if_idle(opened_at + Duration::from_secs(2), opened_at);
        assert!(keeper.is_open());

        // Idle and deleted on disk: closed.
        std::fs::remove_file(&path).unwrap();
        keeper.close_if_idle(opened_at + Duration::from_secs(4), opened_at);
        assert!(!keeper.is_open());
    }

    #[test]
    fn reopen_only_while_mtime_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.fs8");
        std::fs::write(&path, b"payload").unwrap();

        let mut keeper = keeper_for(&path);
        keeper.close();
        assert!(matches!(keeper.ensure_open().unwrap(), HandleStatus::Open));

        keeper.close();
        std::thread::sleep(Duration::from_millis(1100));
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        file.write_all(b"more").unwrap();
        drop(file);
        assert!(matches!(keeper.ensure_open().unwrap(), HandleStatus::Stale));
    }

    #[test]
    fn vanished_file_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.fs8");
        std::fs::write(&path, b"payload").unwrap();

        let mut keeper = keeper_for(&path);
        keeper.close();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(keeper.ensure_open().unwrap(), HandleStatus::Stale));
    }
}
