//! Advisory file locking.
//!
//! All access to a namespace's backing file goes through a try-lock on its
//! `.lock` sidecar: shared for reads, exclusive for writes. Acquisition is
//! attempt-once and never blocks; contention surfaces as
//! [`Error::LockBusy`](crate::Error::LockBusy), which the caller may retry.
//!
//! The [`LockManager`] trait is the seam that lets the storage layer run
//! against an in-memory fake in tests.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// A held advisory lock. Released on drop.
pub trait LockGuard: Send {}

/// Try-lock acquisition over a lock sidecar file.
pub trait LockManager {
    /// Attempts to take a shared (read) lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockBusy`] when the lock is held exclusively
    /// elsewhere, or [`Error::OperationFailed`] on I/O failure.
    fn try_shared(&self, path: &Path) -> Result<Box<dyn LockGuard>>;

    /// Attempts to take an exclusive (write) lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockBusy`] when the lock is held elsewhere, or
    /// [`Error::OperationFailed`] on I/O failure.
    fn try_exclusive(&self, path: &Path) -> Result<Box<dyn LockGuard>>;
}

/// OS advisory locking on a sidecar file via `fs2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLockManager;

impl FsLockManager {
    /// Creates a filesystem lock manager.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn open_sidecar(path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| Error::OperationFailed {
                operation: "open_lock_file".to_string(),
                cause: e.to_string(),
            })
    }
}

impl LockManager for FsLockManager {
    fn try_shared(&self, path: &Path) -> Result<Box<dyn LockGuard>> {
        let file = Self::open_sidecar(path)?;
        // Called through the trait: std's inherent File::try_lock_shared
        // (1.89+) returns a different error type.
        match FileExt::try_lock_shared(&file) {
            Ok(()) => Ok(Box::new(FsLockGuard { file })),
            Err(e) => Err(map_lock_error(&e, path, "acquire_read_lock")),
        }
    }

    fn try_exclusive(&self, path: &Path) -> Result<Box<dyn LockGuard>> {
        let file = Self::open_sidecar(path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Box::new(FsLockGuard { file })),
            Err(e) => Err(map_lock_error(&e, path, "acquire_write_lock")),
        }
    }
}

/// Maps a try-lock failure to the error taxonomy.
///
/// `WouldBlock` means another holder; anything else is an I/O failure.
fn map_lock_error(e: &std::io::Error, path: &Path, operation: &str) -> Error {
    if e.kind() == ErrorKind::WouldBlock || e.kind() == fs2::lock_contended_error().kind() {
        Error::LockBusy {
            path: PathBuf::from(path),
        }
    } else {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: e.to_string(),
        }
    }
}

/// Guard over a locked sidecar file handle.
struct FsLockGuard {
    file: File,
}

impl LockGuard for FsLockGuard {}

impl Drop for FsLockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(error = %e, "failed to release advisory lock");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_shared_locks_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json.lock");
        let manager = FsLockManager::new();

        let first = manager.try_shared(&path).unwrap();
        let second = manager.try_shared(&path).unwrap();
        drop(first);
        drop(second);
    }

    #[test]
    fn test_exclusive_blocks_shared_in_other_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json.lock");
        let manager = FsLockManager::new();

        let guard = manager.try_exclusive(&path).unwrap();
        let busy = manager.try_shared(&path);
        assert!(matches!(busy, Err(Error::LockBusy { .. })));

        drop(guard);
        assert!(manager.try_shared(&path).is_ok());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json.lock");
        let manager = FsLockManager::new();

        drop(manager.try_exclusive(&path).unwrap());
        assert!(manager.try_exclusive(&path).is_ok());
    }
}
