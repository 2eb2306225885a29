//! Filesystem utilities for holdfast.
//!
//! Atomic writes keep persisted records whole; advisory file locks order
//! concurrent readers and writers across processes.

pub mod atomic;
pub mod file_lock;

pub use atomic::atomic_write;
pub use file_lock::{FileLock, LockMode, Probe, is_locked, try_exclusive};
