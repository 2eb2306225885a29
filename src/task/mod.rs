//! Singleton background tasks and their persisted progress.
//!
//! Each task name has one [`TaskState`] record under `<root>/tasks/`, written
//! through the record store so any process can observe it:
//!
//! ```text
//! {
//!   "running": true,
//!   "progress": 0.4,
//!   "started_at": "2026-10-14T09:00:00Z",
//!   "last_updated": "2026-10-14T09:00:02Z"
//! }
//! ```
//!
//! # Lifecycle
//!
//! `Idle -> Running -> Idle (completed or failed)`, and a completed task
//! (`progress == 1`) may be reset back to the default idle record.
//!
//! The execution thread is the only writer while a task runs; `reset` is the
//! only other writer and refuses to touch a running or unfinished task.

mod checkpoint;
mod job;
mod poller;
mod runner;

#[cfg(test)]
mod tests;

pub use checkpoint::Checkpoints;
pub use job::PlaceholderJob;
pub use poller::{PollOutcome, Poller};
pub use runner::{ResetOutcome, StartOutcome, TaskRunner};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted state of one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskState {
    /// True while an execution is in flight.
    pub running: bool,

    /// Fraction complete in `[0, 1]`.
    pub progress: f64,

    /// When the current or last execution started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the last checkpoint was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// When the last execution completed normally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Message of the last abnormal termination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TaskState {
    /// Whether progress has reached 1.
    pub fn is_finished(&self) -> bool {
        self.progress >= 1.0
    }

    /// Whether the task finished and no execution is in flight.
    pub fn is_completed(&self) -> bool {
        self.is_finished() && !self.running
    }

    /// Progress as a whole percentage.
    pub fn percent(&self) -> u32 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

/// Snapshot returned to callers asking for a task's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Task name.
    pub task: String,

    /// The persisted record.
    pub state: TaskState,

    /// The record says running but no process holds the execution lock,
    /// i.e. the runner died without cleaning up.
    pub stale: bool,
}

impl std::fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.stale {
            "stale (runner gone)"
        } else if self.state.running {
            "running"
        } else if self.state.is_finished() {
            "completed"
        } else if self.state.last_error.is_some() {
            "failed"
        } else {
            "idle"
        };

        write!(f, "{}: {:>3}% {}", self.task, self.state.percent(), status)?;

        if let Some(ts) = self.state.last_updated {
            write!(f, ", updated {}", ts.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        if let Some(ts) = self.state.completed_at {
            write!(f, ", completed {}", ts.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        if let Some(err) = &self.state.last_error {
            write!(f, ", error: {}", err)?;
        }
        Ok(())
    }
}
