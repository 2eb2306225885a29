//! Progress checkpoints written by a running task.

use super::TaskState;
use crate::error::{HoldfastError, Result};
use crate::store::StateStore;
use chrono::Utc;
use tracing::debug;

/// Handle a work function uses to persist its progress.
///
/// Progress only moves forward: a fraction below the last checkpoint is
/// raised to it and anything above 1 is capped at 1.
#[derive(Debug)]
pub struct Checkpoints {
    task: String,
    store: StateStore<TaskState>,
    progress: f64,
}

impl Checkpoints {
    pub(super) fn new(task: &str, store: StateStore<TaskState>) -> Self {
        Self {
            task: task.to_string(),
            store,
            progress: 0.0,
        }
    }

    /// Task this handle writes for.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Progress of the last successful checkpoint.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Persist `fraction` as the task's progress and return the stored value.
    pub fn checkpoint(&mut self, fraction: f64) -> Result<f64> {
        if !fraction.is_finite() {
            return Err(HoldfastError::TaskFailed(format!(
                "task '{}' reported non-finite progress {}",
                self.task, fraction
            )));
        }

        let progress = fraction.clamp(self.progress, 1.0);
        self.store.update(|state| {
            state.progress = progress;
            state.last_updated = Some(Utc::now());
        })?;
        self.progress = progress;

        debug!(task = %self.task, progress, "checkpoint");
        Ok(progress)
    }
}
