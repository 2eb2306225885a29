//! Lease acquisition, release, and status queries.

use super::record::{LeaseRecord, ceil_millis};
use crate::context::Workspace;
use crate::error::{HoldfastError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::store::{Mutation, StateStore};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Result of an acquire attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    /// The caller now holds the lease.
    Granted(LeaseRecord),
    /// A live lease is held by someone else.
    Denied {
        /// Current holder.
        holder_id: String,
        /// Time until the current lease expires.
        remaining: Duration,
    },
}

impl AcquireOutcome {
    /// Whether the lease was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, AcquireOutcome::Granted(_))
    }
}

/// Result of a release attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The caller's lease record was removed.
    Released,
    /// The caller does not hold the lease; nothing changed.
    NotHolder {
        /// Holder of the stored record, if any.
        current: Option<String>,
    },
}

/// A lease that is live at the time it was queried.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLease {
    /// The stored record.
    pub record: LeaseRecord,
    /// Time until it expires.
    pub remaining: Duration,
}

impl std::fmt::Display for ActiveLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "held by {} (acquired {}, expires in {}s",
            self.record.holder_id,
            self.record.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.remaining.as_secs()
        )?;
        if let Some(owner) = &self.record.owner {
            write!(f, ", owner: {}", owner)?;
        }
        if let Some(pid) = self.record.pid {
            write!(f, ", pid: {}", pid)?;
        }
        write!(f, ")")
    }
}

/// Grants time-bounded exclusive leases on named resources.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    workspace: Workspace,
    events: EventLog,
    default_ttl: Duration,
}

impl LeaseManager {
    /// Create a manager for the workspace.
    ///
    /// `default_ttl` is used for legacy records that carry no TTL of their own.
    pub fn new(workspace: Workspace, events: EventLog, default_ttl: Duration) -> Self {
        Self {
            workspace,
            events,
            default_ttl,
        }
    }

    fn store(&self, resource: &str) -> Result<StateStore<LeaseRecord>> {
        Ok(StateStore::new(self.workspace.lease_path(resource)?))
    }

    /// Acquire or refresh the lease on `resource` for `holder_id`.
    pub fn acquire(
        &self,
        resource: &str,
        holder_id: &str,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        self.acquire_at(resource, holder_id, ttl, Utc::now())
    }

    /// [`acquire`](Self::acquire) evaluated at an explicit instant.
    pub fn acquire_at(
        &self,
        resource: &str,
        holder_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<AcquireOutcome> {
        validate_holder(holder_id)?;
        if ttl.is_zero() {
            return Err(HoldfastError::UserError(
                "lease TTL must be greater than 0".to_string(),
            ));
        }

        let store = self.store(resource)?;
        let default_ttl = self.default_ttl;

        // The checks below run with the record's exclusive lock held.
        let outcome = store.transact(|current| match current {
            Some(existing) if existing.holder_id != holder_id => {
                match existing.remaining(existing.ttl_or(default_ttl), now) {
                    Some(remaining) => (
                        Mutation::Keep,
                        AcquireOutcome::Denied {
                            holder_id: existing.holder_id,
                            remaining,
                        },
                    ),
                    None => grant(holder_id, ttl, now),
                }
            }
            _ => grant(holder_id, ttl, now),
        })?;

        match &outcome {
            AcquireOutcome::Granted(_) => {
                let ttl_ms = ceil_millis(ttl);
                info!(resource, holder_id, ttl_ms, "lease granted");
                self.events.record(
                    Event::new(EventAction::LeaseGrant, resource)
                        .with_actor(holder_id)
                        .with_details(json!({ "ttl_ms": ttl_ms })),
                );
            }
            AcquireOutcome::Denied {
                holder_id: current,
                remaining,
            } => {
                debug!(
                    resource,
                    holder_id,
                    current = %current,
                    remaining_ms = remaining.as_millis() as u64,
                    "lease denied"
                );
            }
        }

        Ok(outcome)
    }

    /// Release the lease on `resource` if `holder_id` holds it.
    pub fn release(&self, resource: &str, holder_id: &str) -> Result<ReleaseOutcome> {
        validate_holder(holder_id)?;
        let store = self.store(resource)?;

        let outcome = store.transact(|current| match current {
            Some(existing) if existing.holder_id == holder_id => {
                (Mutation::Remove, ReleaseOutcome::Released)
            }
            other => (
                Mutation::Keep,
                ReleaseOutcome::NotHolder {
                    current: other.map(|r| r.holder_id),
                },
            ),
        })?;

        if outcome == ReleaseOutcome::Released {
            info!(resource, holder_id, "lease released");
            self.events
                .record(Event::new(EventAction::LeaseRelease, resource).with_actor(holder_id));
        }

        Ok(outcome)
    }

    /// The live lease on `resource`, if any.
    pub fn status(&self, resource: &str) -> Result<Option<ActiveLease>> {
        self.status_at(resource, Utc::now())
    }

    /// [`status`](Self::status) evaluated at an explicit instant.
    ///
    /// A corrupt record reads as no lease; the next acquire rewrites it.
    pub fn status_at(&self, resource: &str, now: DateTime<Utc>) -> Result<Option<ActiveLease>> {
        let record = match self.store(resource)?.read() {
            Ok(record) => record,
            Err(err @ HoldfastError::CorruptState { .. }) => {
                tracing::warn!(resource, error = %err, "ignoring corrupt lease record");
                None
            }
            Err(err) => return Err(err),
        };

        Ok(record.and_then(|record| {
            let remaining = record.remaining(record.ttl_or(self.default_ttl), now)?;
            Some(ActiveLease { record, remaining })
        }))
    }

    /// Holder of the live lease on `resource`, if any.
    pub fn is_held(&self, resource: &str) -> Result<Option<String>> {
        self.is_held_at(resource, Utc::now())
    }

    /// [`is_held`](Self::is_held) evaluated at an explicit instant.
    pub fn is_held_at(&self, resource: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        Ok(self
            .status_at(resource, now)?
            .map(|lease| lease.record.holder_id))
    }
}

fn grant(
    holder_id: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> (Mutation<LeaseRecord>, AcquireOutcome) {
    let record = LeaseRecord::new(holder_id, ttl, now);
    (
        Mutation::Replace(record.clone()),
        AcquireOutcome::Granted(record),
    )
}

fn validate_holder(holder_id: &str) -> Result<()> {
    if holder_id.trim().is_empty() {
        return Err(HoldfastError::UserError(
            "holder id must not be empty".to_string(),
        ));
    }
    Ok(())
}
