//! Persisted run state under the state directory (`~/.natter` by default).
//!
//! Two kinds of files live there: the message marker, a single file holding
//! the id of the last processed message and doubling as the single-instance
//! lock, and one empty file per chore whose mtime records the chore's last
//! completion.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::StateError;

/// The last-processed-message marker file.
///
/// Holding a `MessageMarker` means holding an exclusive advisory lock on the
/// marker file, so at most one instance runs against a given state directory
/// at a time. The lock is released when the marker is dropped.
pub struct MessageMarker {
    path: PathBuf,
    file: File,
}

impl MessageMarker {
    /// Open (creating if necessary) and lock the marker file.
    ///
    /// Fails with [`StateError::Locked`] if another process holds the lock,
    /// without blocking.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| StateError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StateError::Io {
                path: path.clone(),
                source,
            })?;
        file.try_lock_exclusive()
            .map_err(|_| StateError::Locked { path: path.clone() })?;
        debug!(path = %path.display(), "acquired message marker lock");
        Ok(Self { path, file })
    }

    /// Read the id recorded by the previous run. `None` if the file is
    /// empty or holds something unparsable.
    pub fn last_id(&mut self) -> Result<Option<u64>, StateError> {
        let mut buf = String::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut buf))
            .map_err(|source| StateError::Io {
                path: self.path.clone(),
                source,
            })?;
        match buf.trim().parse::<u64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                if !buf.trim().is_empty() {
                    warn!(path = %self.path.display(), "unparsable message marker, ignoring");
                }
                Ok(None)
            }
        }
    }

    /// Overwrite the marker with the given id.
    ///
    /// Losing this write would replay every message next run, so callers
    /// treat a failure here as fatal.
    pub fn record(&mut self, id: u64) -> Result<(), StateError> {
        let write = |f: &mut File| {
            f.seek(SeekFrom::Start(0))?;
            f.set_len(0)?;
            f.write_all(format!("{id}\n").as_bytes())?;
            f.flush()
        };
        write(&mut self.file).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(id, "recorded message marker");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for MessageMarker {
    fn drop(&mut self) {
        // Unlock failure only matters if the process lives on, and the
        // lock dies with the fd anyway.
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// Per-chore completion timestamps, one file per chore name.
pub struct ChoreLedger {
    dir: PathBuf,
}

impl ChoreLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Seconds since the named chore last completed. `None` if it never ran
    /// (or its stamp file is unreadable, which counts as never).
    pub fn elapsed_secs(&self, name: &str) -> Option<u64> {
        let meta = fs::metadata(self.stamp_path(name)).ok()?;
        let mtime = meta.modified().ok()?;
        SystemTime::now()
            .duration_since(mtime)
            .ok()
            .map(|d| d.as_secs())
    }

    /// Stamp the named chore as completed now.
    ///
    /// Rewrites the stamp file rather than touching it, so creation and
    /// refresh are the same operation.
    pub fn stamp(&self, name: &str) -> Result<(), StateError> {
        fs::create_dir_all(&self.dir).map_err(|source| StateError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.stamp_path(name);
        let epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        fs::write(&path, epoch.to_string()).map_err(|source| StateError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(chore = name, "stamped chore completion");
        Ok(())
    }

    fn stamp_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}
