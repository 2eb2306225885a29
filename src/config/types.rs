//! Configuration types and defaults for holdfast.

use serde::{Deserialize, Serialize};

/// Per-task override of the placeholder job's shape.
///
/// Fields left out fall back to the top-level `task_steps` and
/// `task_step_interval_ms`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Number of checkpoint steps the job performs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,

    /// Delay between checkpoints in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_interval_ms: Option<u64>,
}

// Default value functions for serde
pub(crate) fn default_lease_ttl_secs() -> u64 {
    300
}
pub(crate) fn default_task_steps() -> u32 {
    100
}
pub(crate) fn default_task_step_interval_ms() -> u64 {
    500
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    100
}
