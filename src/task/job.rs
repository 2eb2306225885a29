//! Placeholder job: a fixed number of timed steps with a checkpoint after each.

use super::Checkpoints;
use crate::error::Result;
use std::thread;
use std::time::Duration;

/// Stand-in for real background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderJob {
    steps: u32,
    step_interval: Duration,
}

impl PlaceholderJob {
    /// A job of `steps` steps, sleeping `step_interval` before each checkpoint.
    pub fn new(steps: u32, step_interval: Duration) -> Self {
        Self {
            steps: steps.max(1),
            step_interval,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn step_interval(&self) -> Duration {
        self.step_interval
    }

    /// Run every step, checkpointing `step / steps` after each one.
    ///
    /// The last step writes no checkpoint of its own: the runner's completion
    /// record stores `progress = 1` together with `running = false`, so
    /// observers never see a finished task that still claims to be running.
    pub fn run(&self, checkpoints: &mut Checkpoints) -> Result<()> {
        for step in 1..=self.steps {
            thread::sleep(self.step_interval);
            if step < self.steps {
                checkpoints.checkpoint(f64::from(step) / f64::from(self.steps))?;
            }
        }
        Ok(())
    }
}
