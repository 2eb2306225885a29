//! Audit log for holdfast.
//!
//! Task transitions and lease grants are appended to `<root>/events.ndjson`,
//! one JSON object per line:
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (task_start, lease_grant, ...)
//! - `actor`: the owner string of the process (`user@HOST`) or a holder id
//! - `subject`: the task or resource name
//! - `details`: freeform object with action-specific details
//!
//! Appends from several processes are serialized with an exclusive advisory
//! lock on the log file. The log is informational: [`EventLog::record`] logs a
//! warning on failure instead of failing the operation that triggered it.

use crate::context::owner_string;
use crate::error::{HoldfastError, Result};
use crate::fs::{FileLock, LockMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Task execution started
    TaskStart,
    /// Task execution finished normally
    TaskComplete,
    /// Task execution terminated abnormally
    TaskFail,
    /// Completed task state reset to idle
    TaskReset,
    /// Lease granted or refreshed
    LeaseGrant,
    /// Lease released by its holder
    LeaseRelease,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventAction::TaskStart => "task_start",
            EventAction::TaskComplete => "task_complete",
            EventAction::TaskFail => "task_fail",
            EventAction::TaskReset => "task_reset",
            EventAction::LeaseGrant => "lease_grant",
            EventAction::LeaseRelease => "lease_release",
        };
        f.write_str(name)
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// Who performed the action.
    pub actor: String,

    /// Task or resource name.
    pub subject: String,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event for `subject`, stamped now and attributed to this process.
    pub fn new(action: EventAction, subject: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: owner_string(),
            subject: subject.into(),
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Override the actor (e.g. with a lease holder id).
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            HoldfastError::IoFailure(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Append-only NDJSON event log.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Create a log writing to `path`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event as one line, creating the file if needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let json_line = event.to_ndjson_line()?;

        let _lock = FileLock::acquire(&self.path, LockMode::Exclusive)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HoldfastError::io("open events file", &self.path, e))?;

        writeln!(file, "{}", json_line)
            .and_then(|()| file.sync_all())
            .map_err(|e| HoldfastError::io("append event to", &self.path, e))
    }

    /// Append an event, logging a warning instead of failing.
    pub fn record(&self, event: Event) {
        if let Err(e) = self.append(&event) {
            warn!(
                action = %event.action,
                subject = %event.subject,
                error = %e,
                "failed to record event"
            );
        }
    }

    /// Read the last `count` parseable events, oldest first.
    pub fn read_last(&self, count: usize) -> Vec<Event> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };

        let mut parsed: Vec<Event> = content
            .lines()
            .rev()
            .filter_map(|line| serde_json::from_str::<Event>(line).ok())
            .take(count)
            .collect();
        parsed.reverse();
        parsed
    }
}
