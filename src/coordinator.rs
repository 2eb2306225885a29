//! Collaborator-facing entry point.
//!
//! A [`Coordinator`] bundles one workspace with its config, the process's task
//! registry, and the lease manager. Callers create one per process and share it
//! by reference; there is no global instance.

use crate::config::Config;
use crate::context::Workspace;
use crate::error::Result;
use crate::events::EventLog;
use crate::lease::{AcquireOutcome, ActiveLease, LeaseManager, ReleaseOutcome};
use crate::task::{Poller, ProgressReport, ResetOutcome, StartOutcome, TaskRunner};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Coordinator {
    workspace: Workspace,
    config: Config,
    events: EventLog,
    runner: TaskRunner,
    leases: LeaseManager,
}

impl Coordinator {
    /// Open the workspace at `root` (or the default root) and load its config.
    ///
    /// A missing `holdfast.yaml` means defaults; an invalid one is an error.
    pub fn open(root: Option<&Path>) -> Result<Self> {
        let workspace = Workspace::resolve(root);
        let config = Config::load_or_default(workspace.config_path())?;
        debug!(root = %workspace.root.display(), "workspace opened");
        Ok(Self::new(workspace, config))
    }

    pub fn new(workspace: Workspace, config: Config) -> Self {
        let events = EventLog::new(workspace.events_file());
        let runner = TaskRunner::new(workspace.clone(), events.clone());
        let leases = LeaseManager::new(
            workspace.clone(),
            events.clone(),
            Duration::from_secs(config.lease_ttl_secs),
        );

        Self {
            workspace,
            config,
            events,
            runner,
            leases,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Start the configured placeholder job for `name` in the background.
    pub fn start_task(&self, name: &str) -> Result<StartOutcome> {
        let job = self.config.job_for(name);
        debug!(task = name, steps = job.steps(), "starting placeholder job");
        self.runner.start(name, move |checkpoints| job.run(checkpoints))
    }

    /// Current progress of `name`, with crash detection.
    pub fn get_progress(&self, name: &str) -> Result<ProgressReport> {
        self.runner.report(name)
    }

    pub fn reset_task(&self, name: &str) -> Result<ResetOutcome> {
        self.runner.reset(name)
    }

    /// Block until this process's execution of `name` exits.
    pub fn wait_task(&self, name: &str) -> bool {
        self.runner.wait(name)
    }

    /// A poller for `name` at the configured interval.
    pub fn poller(&self, name: &str) -> Result<Poller> {
        Ok(Poller::new(
            self.runner.store(name)?,
            self.config.poll_interval(),
        ))
    }

    /// Acquire `resource` for `holder_id`; `ttl` defaults to the configured TTL.
    pub fn acquire_lease(
        &self,
        resource: &str,
        holder_id: &str,
        ttl: Option<Duration>,
    ) -> Result<AcquireOutcome> {
        let ttl = ttl.unwrap_or_else(|| self.config.lease_ttl_for(resource));
        self.leases.acquire(resource, holder_id, ttl)
    }

    pub fn release_lease(&self, resource: &str, holder_id: &str) -> Result<ReleaseOutcome> {
        self.leases.release(resource, holder_id)
    }

    /// Current live holder of `resource`, if any.
    pub fn is_leased(&self, resource: &str) -> Result<Option<String>> {
        self.leases.is_held(resource)
    }

    pub fn lease_status(&self, resource: &str) -> Result<Option<ActiveLease>> {
        self.leases.status(resource)
    }
}
