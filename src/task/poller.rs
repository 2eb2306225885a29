//! Fixed-cadence progress observer.
//!
//! A poller only reads the task record, so any number of them may run in any
//! number of processes without coordinating. It is a plain loop owned by its
//! caller; nothing runs in the background once `poll` returns.

use super::TaskState;
use crate::error::Result;
use crate::store::StateStore;
use std::ops::ControlFlow;
use std::thread;
use std::time::{Duration, Instant};

/// Why a poll loop ended, with the last state observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Progress reached 1.
    Completed(TaskState),
    /// The task stopped running before reaching 1.
    Stopped(TaskState),
    /// The observer asked to stop.
    Detached(TaskState),
    /// The timeout elapsed first.
    TimedOut(TaskState),
}

impl PollOutcome {
    /// The last state observed.
    pub fn state(&self) -> &TaskState {
        match self {
            PollOutcome::Completed(s)
            | PollOutcome::Stopped(s)
            | PollOutcome::Detached(s)
            | PollOutcome::TimedOut(s) => s,
        }
    }
}

/// Re-reads a task record at a fixed interval until the task finishes.
#[derive(Debug, Clone)]
pub struct Poller {
    store: StateStore<TaskState>,
    interval: Duration,
    timeout: Option<Duration>,
}

impl Poller {
    pub fn new(store: StateStore<TaskState>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            timeout: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Give up after `timeout` even if the task is still running.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load the record once.
    pub fn snapshot(&self) -> Result<TaskState> {
        self.store.load_or_default()
    }

    /// Hand every loaded snapshot to `observer` until the task completes,
    /// stops, the observer breaks, or the timeout elapses.
    pub fn poll<F>(&self, mut observer: F) -> Result<PollOutcome>
    where
        F: FnMut(&TaskState) -> ControlFlow<()>,
    {
        let started = Instant::now();

        loop {
            let state = self.snapshot()?;

            if observer(&state).is_break() {
                return Ok(PollOutcome::Detached(state));
            }
            if state.is_finished() {
                return Ok(PollOutcome::Completed(state));
            }
            if !state.running {
                return Ok(PollOutcome::Stopped(state));
            }
            if self.timeout.is_some_and(|t| started.elapsed() >= t) {
                return Ok(PollOutcome::TimedOut(state));
            }

            thread::sleep(self.interval);
        }
    }
}
