//! Workspace layout resolution for holdfast.
//!
//! Every cooperating process points at the same workspace root on a shared
//! filesystem. This module owns the mapping from task and resource names to
//! the files under that root, so no other module builds paths by hand.
//!
//! ```text
//! <root>/
//!   holdfast.yaml          configuration
//!   events.ndjson          audit log
//!   tasks/<name>.json      TaskState record (+ .lock sidecar)
//!   tasks/<name>.run       execution lock held while the task runs
//!   leases/<name>.json     Lease record (+ .lock sidecar)
//! ```

use crate::error::{HoldfastError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Default workspace directory, relative to the working directory.
pub const DEFAULT_ROOT: &str = ".holdfast";

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("Invalid name regex")
});

/// Resolved paths for a holdfast workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Workspace root shared by all cooperating processes.
    pub root: PathBuf,

    /// Directory holding TaskState records and execution locks.
    pub tasks_dir: PathBuf,

    /// Directory holding Lease records.
    pub leases_dir: PathBuf,
}

impl Workspace {
    /// Build the layout for the given root. Nothing is created on disk.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        Self {
            tasks_dir: root.join("tasks"),
            leases_dir: root.join("leases"),
            root,
        }
    }

    /// Resolve the workspace from an explicit root or the default location.
    pub fn resolve(root: Option<&Path>) -> Self {
        Self::new(root.unwrap_or(Path::new(DEFAULT_ROOT)))
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("holdfast.yaml")
    }

    /// Get the path to the audit log.
    pub fn events_file(&self) -> PathBuf {
        self.root.join("events.ndjson")
    }

    /// Get the path to a TaskState record.
    pub fn task_state_path(&self, task: &str) -> Result<PathBuf> {
        Ok(self.tasks_dir.join(format!("{}.json", validate_name(task)?)))
    }

    /// Get the path to a task's execution lock file.
    pub fn task_run_lock_path(&self, task: &str) -> Result<PathBuf> {
        Ok(self.tasks_dir.join(format!("{}.run", validate_name(task)?)))
    }

    /// Get the path to a Lease record.
    pub fn lease_path(&self, resource: &str) -> Result<PathBuf> {
        Ok(self.leases_dir.join(format!("{}.json", validate_name(resource)?)))
    }
}

/// Default identity of this caller, `user@HOST`.
pub fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Validate a task or resource name.
///
/// Names become file names, so path separators and traversal are rejected.
pub fn validate_name(name: &str) -> Result<&str> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(HoldfastError::UserError(format!(
            "invalid name '{}': contains path traversal characters",
            name
        )));
    }

    if !NAME_REGEX.is_match(name) {
        return Err(HoldfastError::UserError(format!(
            "invalid name '{}': use 1-128 letters, digits, '.', '_' or '-', \
             starting with a letter or digit",
            name
        )));
    }

    Ok(name)
}
