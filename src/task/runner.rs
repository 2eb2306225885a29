//! Singleton task runner.
//!
//! Two layers keep a task name down to one live execution:
//!
//! - an in-process registry of execution threads keyed by task name, which
//!   answers [`StartOutcome::AlreadyRunning`];
//! - an execution lock file `<root>/tasks/<name>.run`, probed without waiting
//!   on its holder (one short retry covers a reader's momentary probe) and then
//!   held by the execution thread until it exits. A held lock means another
//!   process is running the task ([`StartOutcome::Blocked`]).
//!
//! The kernel drops the execution lock when its holder dies, so a record that
//! still says `running` while the lock is free belongs to a crashed runner.
//! `start` restarts such a task and `report` flags it as stale.

use super::{Checkpoints, ProgressReport, TaskState};
use crate::context::Workspace;
use crate::error::{HoldfastError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::fs::{FileLock, Probe, is_locked, try_exclusive};
use crate::store::{Mutation, StateStore};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pause before the second probe of a contended execution lock.
const RUN_LOCK_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new execution was spawned.
    Started,
    /// This process already runs the task.
    AlreadyRunning,
    /// Another process holds the task's execution lock.
    Blocked,
}

/// Result of a reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The record was returned to the default idle state.
    Reset,
    /// The task has not completed; nothing changed.
    NotCompleted,
}

/// Registry of task executions for this process.
#[derive(Debug)]
pub struct TaskRunner {
    workspace: Workspace,
    events: EventLog,
    executions: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TaskRunner {
    pub fn new(workspace: Workspace, events: EventLog) -> Self {
        Self {
            workspace,
            events,
            executions: Mutex::new(HashMap::new()),
        }
    }

    /// Record store for a task's state.
    pub fn store(&self, task: &str) -> Result<StateStore<TaskState>> {
        Ok(StateStore::new(self.workspace.task_state_path(task)?))
    }

    /// Start `work` as the single execution of `task`, without waiting for it.
    ///
    /// The work function reports progress through the [`Checkpoints`] handle.
    /// Returning an error or panicking ends the execution as failed: `running`
    /// is cleared and progress stays at the last checkpoint.
    pub fn start<F>(&self, task: &str, work: F) -> Result<StartOutcome>
    where
        F: FnOnce(&mut Checkpoints) -> Result<()> + Send + 'static,
    {
        let store = self.store(task)?;
        let run_lock_path = self.workspace.task_run_lock_path(task)?;

        // Held until the thread is registered so two callers cannot both pass.
        let mut executions = self.executions();

        if executions.get(task).is_some_and(|h| !h.is_finished()) {
            debug!(task, "start refused: already running in this process");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let run_lock = match probe_run_lock(&run_lock_path)? {
            Probe::Acquired(lock) => lock,
            Probe::AlreadyLocked => {
                debug!(task, "start refused: execution lock held elsewhere");
                return Ok(StartOutcome::Blocked);
            }
        };

        let previous = store.load_or_default()?;
        if previous.running {
            warn!(
                task,
                last_updated = ?previous.last_updated,
                "previous execution exited without cleaning up; restarting"
            );
        }

        let now = Utc::now();
        store.save(&TaskState {
            running: true,
            progress: 0.0,
            started_at: Some(now),
            last_updated: Some(now),
            completed_at: None,
            last_error: None,
        })?;
        self.events.record(Event::new(EventAction::TaskStart, task));

        let execution = Execution {
            task: task.to_string(),
            store: store.clone(),
            events: self.events.clone(),
            settled: false,
            _run_lock: run_lock,
        };
        let checkpoints = Checkpoints::new(task, store);

        // On spawn failure the closure is dropped, and with it the execution
        // guard, which marks the task failed and releases the lock.
        let handle = thread::Builder::new()
            .name(format!("holdfast-{}", task))
            .spawn(move || execution.run(checkpoints, work))
            .map_err(|e| HoldfastError::io("spawn execution thread for", &run_lock_path, e))?;

        executions.insert(task.to_string(), handle);
        info!(task, "task started");
        Ok(StartOutcome::Started)
    }

    /// Whether this process has a live execution of `task`.
    pub fn is_running(&self, task: &str) -> bool {
        self.executions()
            .get(task)
            .is_some_and(|h| !h.is_finished())
    }

    /// Wait for this process's execution of `task` to exit.
    ///
    /// Returns false when there was nothing to wait for.
    pub fn wait(&self, task: &str) -> bool {
        let handle = self.executions().remove(task);
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    debug!(task, "execution thread panicked");
                }
                true
            }
            None => false,
        }
    }

    /// Load the task's record and check whether a claimed run is still alive.
    pub fn report(&self, task: &str) -> Result<ProgressReport> {
        let state = self.store(task)?.load_or_default()?;

        let stale = state.running
            && !self.is_running(task)
            && !is_locked(self.workspace.task_run_lock_path(task)?)?;

        Ok(ProgressReport {
            task: task.to_string(),
            state,
            stale,
        })
    }

    /// Return a completed task to the default idle record.
    pub fn reset(&self, task: &str) -> Result<ResetOutcome> {
        let outcome = self.store(task)?.transact(|current| {
            let state = current.unwrap_or_default();
            if state.is_completed() {
                (Mutation::Replace(TaskState::default()), ResetOutcome::Reset)
            } else {
                (Mutation::Keep, ResetOutcome::NotCompleted)
            }
        })?;

        if outcome == ResetOutcome::Reset {
            info!(task, "task state reset");
            self.events.record(Event::new(EventAction::TaskReset, task));
        }
        Ok(outcome)
    }

    fn executions(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Probe the execution lock, trying once more after a short pause.
///
/// `report` holds the lock for the instant of its own probe; a single retry
/// keeps that from reading as a live execution in another process.
fn probe_run_lock(path: &Path) -> Result<Probe> {
    match try_exclusive(path)? {
        Probe::AlreadyLocked => {
            thread::sleep(RUN_LOCK_RETRY_DELAY);
            try_exclusive(path)
        }
        acquired => Ok(acquired),
    }
}

/// One execution on its own thread.
///
/// Dropping an unsettled execution, including during a panic, records it as
/// failed. The execution lock is the last field, so it is released only after
/// the final state is written.
struct Execution {
    task: String,
    store: StateStore<TaskState>,
    events: EventLog,
    settled: bool,
    _run_lock: FileLock,
}

impl Execution {
    fn run<F>(mut self, mut checkpoints: Checkpoints, work: F)
    where
        F: FnOnce(&mut Checkpoints) -> Result<()>,
    {
        match work(&mut checkpoints) {
            Ok(()) => self.complete(),
            Err(e) => self.fail(&e.to_string()),
        }
    }

    fn complete(&mut self) {
        self.settled = true;
        let now = Utc::now();

        let saved = self.store.update(|state| {
            state.running = false;
            state.progress = 1.0;
            state.last_updated = Some(now);
            state.completed_at = Some(now);
        });

        match saved {
            Ok(()) => {
                info!(task = %self.task, "task completed");
                self.events
                    .record(Event::new(EventAction::TaskComplete, self.task.as_str()));
            }
            Err(e) => error!(task = %self.task, error = %e, "failed to persist task completion"),
        }
    }

    fn fail(&mut self, reason: &str) {
        self.settled = true;

        let saved = self.store.update(|state| {
            state.running = false;
            state.last_error = Some(reason.to_string());
        });

        if let Err(e) = saved {
            error!(task = %self.task, error = %e, "failed to clear running flag");
        }
        warn!(task = %self.task, reason, "task failed");
        self.events.record(
            Event::new(EventAction::TaskFail, self.task.as_str())
                .with_details(json!({ "error": reason })),
        );
    }
}

impl Drop for Execution {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let reason = if thread::panicking() {
            "work function panicked"
        } else {
            "execution ended before reporting an outcome"
        };
        self.fail(reason);
    }
}
