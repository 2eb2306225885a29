//! Config loading, validation, and policy lookups.

use super::model::Config;
use crate::error::{HoldfastError, Result};
use crate::task::PlaceholderJob;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            HoldfastError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, using defaults when the file is absent.
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| HoldfastError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            HoldfastError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Every TTL, step count and interval must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.lease_ttl_secs == 0 {
            return Err(invalid("lease_ttl_secs must be greater than 0"));
        }

        for (resource, ttl) in &self.lease_ttls {
            if *ttl == 0 {
                return Err(invalid(&format!(
                    "lease_ttls.{} must be greater than 0",
                    resource
                )));
            }
        }

        if self.task_steps == 0 {
            return Err(invalid("task_steps must be greater than 0"));
        }

        if self.task_step_interval_ms == 0 {
            return Err(invalid("task_step_interval_ms must be greater than 0"));
        }

        for (task, settings) in &self.tasks {
            if settings.steps == Some(0) {
                return Err(invalid(&format!("tasks.{}.steps must be greater than 0", task)));
            }
            if settings.step_interval_ms == Some(0) {
                return Err(invalid(&format!(
                    "tasks.{}.step_interval_ms must be greater than 0",
                    task
                )));
            }
        }

        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than 0"));
        }

        Ok(())
    }

    /// Lease TTL for a resource, honoring per-resource overrides.
    pub fn lease_ttl_for(&self, resource: &str) -> Duration {
        let secs = self
            .lease_ttls
            .get(resource)
            .copied()
            .unwrap_or(self.lease_ttl_secs);
        Duration::from_secs(secs)
    }

    /// Placeholder job shape for a task, honoring per-task overrides.
    pub fn job_for(&self, task: &str) -> PlaceholderJob {
        let settings = self.tasks.get(task);
        let steps = settings
            .and_then(|s| s.steps)
            .unwrap_or(self.task_steps);
        let interval_ms = settings
            .and_then(|s| s.step_interval_ms)
            .unwrap_or(self.task_step_interval_ms);

        PlaceholderJob::new(steps, Duration::from_millis(interval_ms))
    }

    /// Interval between progress reloads.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn invalid(message: &str) -> HoldfastError {
    HoldfastError::UserError(format!("config validation failed: {}", message))
}
