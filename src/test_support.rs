use crate::context::Workspace;
use crate::events::EventLog;
use crate::lease::LeaseManager;
use crate::task::TaskRunner;
use std::time::Duration;
use tempfile::TempDir;

/// A workspace rooted in a fresh temporary directory.
pub(crate) struct TestWorkspace {
    _temp_dir: TempDir,
    pub(crate) workspace: Workspace,
}

impl TestWorkspace {
    pub(crate) fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let workspace = Workspace::new(temp_dir.path().join("shared"));
        Self {
            _temp_dir: temp_dir,
            workspace,
        }
    }

    pub(crate) fn events(&self) -> EventLog {
        EventLog::new(self.workspace.events_file())
    }

    pub(crate) fn leases(&self) -> LeaseManager {
        LeaseManager::new(
            self.workspace.clone(),
            self.events(),
            Duration::from_secs(300),
        )
    }

    pub(crate) fn runner(&self) -> TaskRunner {
        TaskRunner::new(self.workspace.clone(), self.events())
    }
}
