//! Interprocess reader/writer lock backed by an advisory file lock.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use tracing::trace;

use crate::error::{Error, Result};

/// Reader/writer lock on a lock file shared by every process using a tree.
///
/// Each acquisition opens its own handle, so two guards held at once by the
/// same process contend like guards from different processes. Do not nest them.
#[derive(Debug)]
pub(crate) struct TreeLock {
    path: PathBuf,
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub(crate) struct LockGuard {
    file: File,
    exclusive: bool,
}

impl TreeLock {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            // Readonly trees may live on a filesystem we cannot write to.
            .or_else(|_| File::open(&self.path))
            .map_err(|source| Error::Lock {
                path: self.path.clone(),
                source,
            })
    }

    /// Block until a shared lock is held.
    pub(crate) fn read(&self) -> Result<LockGuard> {
        let file = self.open()?;
        file.lock_shared().map_err(|source| Error::Lock {
            path: self.path.clone(),
            source,
        })?;
        trace!("Acquired shared lock on {}", self.path.display());
        Ok(LockGuard {
            file,
            exclusive: false,
        })
    }

    /// Block until the exclusive lock is held.
    pub(crate) fn write(&self) -> Result<LockGuard> {
        let file = self.open()?;
        file.lock().map_err(|source| Error::Lock {
            path: self.path.clone(),
            source,
        })?;
        trace!("Acquired exclusive lock on {}", self.path.display());
        Ok(LockGuard {
            file,
            exclusive: true,
        })
    }

    /// Shared lock for readonly handles, exclusive otherwise.
    pub(crate) fn acquire(&self, readonly: bool) -> Result<LockGuard> {
        if readonly {
            self.read()
        } else {
            self.write()
        }
    }
}

impl LockGuard {
    #[cfg(test)]
    pub(crate) fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release file lock: {}", e);
        } else {
            trace!(
                "Released {} lock",
                if self.exclusive { "exclusive" } else { "shared" }
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::TryLockError;

    #[test]
    fn test_lock_file_is_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock = TreeLock::new(dir.path().join(".LOCK"));
        let guard = lock.read().unwrap();
        assert!(lock.path().exists());
        assert!(!guard.is_exclusive());
    }

    #[test]
    fn test_shared_locks_coexist() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock = TreeLock::new(dir.path().join(".LOCK"));
        let _a = lock.read().unwrap();
        let other = File::open(lock.path()).unwrap();
        assert!(other.try_lock_shared().is_ok());
    }

    #[test]
    fn test_exclusive_blocks_others_until_dropped() {
        let dir = tempfile::TempDir::new().unwrap();
        let lock = TreeLock::new(dir.path().join(".LOCK"));
        let guard = lock.acquire(false).unwrap();
        assert!(guard.is_exclusive());

        let other = File::open(lock.path()).unwrap();
        assert!(matches!(
            other.try_lock_shared(),
            Err(TryLockError::WouldBlock)
        ));

        drop(guard);
        assert!(other.try_lock_shared().is_ok());
    }
}
