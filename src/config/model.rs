//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a holdfast workspace.
///
/// This struct represents the contents of `<root>/holdfast.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lease settings
    // =========================================================================
    /// Lease TTL in seconds when the caller does not pass one.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// Per-resource lease TTL overrides in seconds.
    #[serde(default)]
    pub lease_ttls: BTreeMap<String, u64>,

    // =========================================================================
    // Task settings
    // =========================================================================
    /// Number of checkpoint steps of the placeholder job.
    #[serde(default = "default_task_steps")]
    pub task_steps: u32,

    /// Delay between checkpoints of the placeholder job, in milliseconds.
    #[serde(default = "default_task_step_interval_ms")]
    pub task_step_interval_ms: u64,

    /// Per-task overrides of the job shape.
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskSettings>,

    // =========================================================================
    // Polling
    // =========================================================================
    /// Interval between progress reloads, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lease_ttl_secs: default_lease_ttl_secs(),
            lease_ttls: BTreeMap::new(),
            task_steps: default_task_steps(),
            task_step_interval_ms: default_task_step_interval_ms(),
            tasks: BTreeMap::new(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
