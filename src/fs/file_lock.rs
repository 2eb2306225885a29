//! Advisory file locks.
//!
//! Two uses, both built on `fs2::FileExt` (flock on POSIX, LockFileEx on
//! Windows):
//!
//! - [`try_exclusive`] is a non-blocking probe that answers "is some other
//!   participant holding this file right now". It never waits.
//! - [`FileLock::acquire`] takes a blocking shared or exclusive lock. The
//!   record store uses it for the duration of a single read or write only.
//!
//! Locks are advisory: they only exclude participants that also check them.
//! The kernel drops a lock when its holder process exits, which is what lets
//! the task runner tell a crashed execution from a live one.
//!
//! Lock files are created on demand and never deleted, so two participants
//! can never end up locking different inodes under the same name.

use crate::error::{HoldfastError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock mode for blocking acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders at once; excludes exclusive holders.
    Shared,
    /// A single holder; excludes everyone else.
    Exclusive,
}

/// Result of a non-blocking exclusive probe.
#[derive(Debug)]
pub enum Probe {
    /// The lock was obtained; it is held until the guard is dropped.
    Acquired(FileLock),
    /// Another participant holds the lock.
    AlreadyLocked,
}

impl Probe {
    /// Whether the probe obtained the lock.
    pub fn is_acquired(&self) -> bool {
        matches!(self, Probe::Acquired(_))
    }
}

/// RAII guard for an advisory lock on a file.
///
/// When dropped, the lock is released. The file itself is left in place.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Block until the lock on `path` is obtained in the given mode.
    pub fn acquire<P: AsRef<Path>>(path: P, mode: LockMode) -> Result<Self> {
        let path = path.as_ref();
        let file = open_lock_file(path)?;

        let locked = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|e| HoldfastError::io("lock", path, e))?;

        debug!(path = %path.display(), ?mode, "file lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }

    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the lock is held in.
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release file lock");
        } else {
            debug!(path = %self.path.display(), "file lock released");
        }
    }
}

/// Attempt a non-blocking exclusive lock on `path`, creating it if absent.
pub fn try_exclusive<P: AsRef<Path>>(path: P) -> Result<Probe> {
    let path = path.as_ref();
    let file = open_lock_file(path)?;

    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(Probe::Acquired(FileLock {
            file,
            path: path.to_path_buf(),
            mode: LockMode::Exclusive,
        })),
        Err(e) if is_contended(&e) => Ok(Probe::AlreadyLocked),
        Err(e) => Err(HoldfastError::io("probe lock on", path, e)),
    }
}

/// Probe `path` and release immediately; true when someone else holds it.
pub fn is_locked<P: AsRef<Path>>(path: P) -> Result<bool> {
    Ok(!try_exclusive(path)?.is_acquired())
}

fn open_lock_file(path: &Path) -> Result<File> {
    crate::fs::atomic::ensure_parent_dir(path)?;

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| HoldfastError::io("open lock file", path, e))
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_try_exclusive_creates_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("locks").join("build.run");

        let probe = try_exclusive(&path).unwrap();

        assert!(probe.is_acquired());
        assert!(path.exists());
    }

    #[test]
    fn test_try_exclusive_reports_held_lock() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("build.run");

        let first = try_exclusive(&path).unwrap();
        assert!(first.is_acquired());

        let second = try_exclusive(&path).unwrap();
        assert!(matches!(second, Probe::AlreadyLocked));
    }

    #[test]
    fn test_dropping_guard_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("build.run");

        let first = try_exclusive(&path).unwrap();
        assert!(is_locked(&path).unwrap());
        drop(first);

        assert!(!is_locked(&path).unwrap());
    }

    #[test]
    fn test_is_locked_does_not_keep_lock() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.lock");

        assert!(!is_locked(&path).unwrap());
        assert!(!is_locked(&path).unwrap());
    }

    #[test]
    fn test_shared_locks_coexist_and_exclude_probe() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.lock");

        let a = FileLock::acquire(&path, LockMode::Shared).unwrap();
        let b = FileLock::acquire(&path, LockMode::Shared).unwrap();
        assert_eq!(a.mode(), LockMode::Shared);
        assert_eq!(b.path(), path.as_path());

        assert!(is_locked(&path).unwrap());
        drop(a);
        drop(b);
        assert!(!is_locked(&path).unwrap());
    }

    #[test]
    fn test_exclusive_lock_blocks_other_thread_until_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.lock");

        let guard = FileLock::acquire(&path, LockMode::Exclusive).unwrap();

        let waiter_path = path.clone();
        let waiter = std::thread::spawn(move || {
            let started = std::time::Instant::now();
            let _lock = FileLock::acquire(&waiter_path, LockMode::Exclusive).unwrap();
            started.elapsed()
        });

        std::thread::sleep(std::time::Duration::from_millis(100));
        drop(guard);

        let waited = waiter.join().unwrap();
        assert!(waited >= std::time::Duration::from_millis(50));
    }
}
