//! Persistent state store.
//!
//! A [`StateStore`] is bound to one JSON record on disk. All locking for that
//! record lives here so call sites never take file locks themselves.
//!
//! # Locking
//!
//! The readers-writer lock is taken on a sidecar file `<record>.lock`; the
//! record itself is replaced by rename on every save, so locking it directly
//! would lock an inode that is about to be unlinked.
//!
//! - reads take the lock shared, so any number may run at once;
//! - `save`, `remove` and read-modify-write transactions take it exclusive;
//! - the lock is held for the I/O only and never across caller work.
//!
//! # Corrupt records
//!
//! `load`/`read` report unparsable bytes as [`HoldfastError::CorruptState`].
//! `load_or_default` and transactions recover by treating the record as absent,
//! logging a warning; the next write repairs the file.


use crate::error::{HoldfastError, Result};
use crate::fs::{FileLock, LockMode, atomic_write};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a transaction does with the record once its closure returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    /// Leave the stored record untouched.
    Keep,
    /// Write this record.
    Replace(T),
    /// Delete the record.
    Remove,
}

/// Locked JSON storage for a single record of type `T`.
pub struct StateStore<T> {
    path: PathBuf,
    lock_path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for StateStore<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            lock_path: self.lock_path.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StateStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("path", &self.path)
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

impl<T> StateStore<T> {
    /// Create a store for the record at `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let mut lock_name = OsString::from(path.as_os_str());
        lock_name.push(".lock");

        Self {
            lock_path: PathBuf::from(lock_name),
            path,
            _record: PhantomData,
        }
    }

    /// Path of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the sidecar lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl<T: Serialize + DeserializeOwned> StateStore<T> {
    /// Read the record under a shared lock; `None` when no record exists.
    pub fn read(&self) -> Result<Option<T>> {
        let _lock = FileLock::acquire(&self.lock_path, LockMode::Shared)?;
        self.read_unlocked()
    }

    /// Serialize and atomically write `record` under an exclusive lock.
    pub fn save(&self, record: &T) -> Result<()> {
        let _lock = FileLock::acquire(&self.lock_path, LockMode::Exclusive)?;
        self.write_unlocked(record)
    }

    /// Delete the record under an exclusive lock. Returns whether it existed.
    pub fn remove(&self) -> Result<bool> {
        let _lock = FileLock::acquire(&self.lock_path, LockMode::Exclusive)?;
        self.remove_unlocked()
    }

    /// Read-modify-write under a single exclusive lock.
    ///
    /// The closure sees the record as it stands once the lock is held, so any
    /// check it makes cannot be invalidated by a concurrent writer before its
    /// decision is applied. A corrupt record is passed in as `None`.
    pub fn transact<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(Option<T>) -> (Mutation<T>, R),
    {
        let _lock = FileLock::acquire(&self.lock_path, LockMode::Exclusive)?;

        let current = match self.read_unlocked() {
            Ok(current) => current,
            Err(err @ HoldfastError::CorruptState { .. }) => {
                warn!(error = %err, "discarding corrupt record; it will be rewritten");
                None
            }
            Err(err) => return Err(err),
        };

        let (mutation, result) = f(current);
        match mutation {
            Mutation::Keep => {}
            Mutation::Replace(record) => self.write_unlocked(&record)?,
            Mutation::Remove => {
                self.remove_unlocked()?;
            }
        }

        Ok(result)
    }

    fn read_unlocked(&self) -> Result<Option<T>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(HoldfastError::io("read", &self.path, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| HoldfastError::CorruptState {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    fn write_unlocked(&self, record: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(record).map_err(|e| {
            HoldfastError::IoFailure(format!(
                "failed to serialize record for '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        atomic_write(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), "record saved");
        Ok(())
    }

    fn remove_unlocked(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "record removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(HoldfastError::io("remove", &self.path, e)),
        }
    }
}

impl<T: Serialize + DeserializeOwned + Default> StateStore<T> {
    /// Load the record, or the default record when none exists yet.
    pub fn load(&self) -> Result<T> {
        Ok(self.read()?.unwrap_or_default())
    }

    /// Load the record, treating corrupt bytes as the default record.
    pub fn load_or_default(&self) -> Result<T> {
        match self.load() {
            Err(err @ HoldfastError::CorruptState { .. }) => {
                warn!(error = %err, "falling back to default record");
                Ok(T::default())
            }
            other => other,
        }
    }

    /// Mutate the record in place under an exclusive lock and write it back.
    pub fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        self.transact(|current| {
            let mut record = current.unwrap_or_default();
            let result = f(&mut record);
            (Mutation::Replace(record), result)
        })
    }
}
