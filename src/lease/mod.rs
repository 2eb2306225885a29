//! Lease lock manager.
//!
//! A lease grants one holder exclusive use of a named resource for a bounded
//! time. Each resource has one JSON record under `<root>/leases/`:
//! - `holder_id`: identity of the current grantee
//! - `acquired_at`: RFC3339 timestamp (epoch seconds are accepted on read)
//! - `ttl_ms`: TTL the lease was granted with (older records carry `ttl_secs`)
//! - `owner`, `pid`: diagnostics about the granting process
//!
//! # Expiry
//!
//! A lease is live while `now - acquired_at < ttl`. Expiry is evaluated
//! lazily whenever a lease is acquired or queried; there is no sweeper, and an
//! expired record left on disk is simply void.
//!
//! # Races
//!
//! Every acquire and release is a read-modify-write transaction under the
//! record store's exclusive lock, so the expiry and holder checks are made
//! against the record as it stands when the write happens. Two callers racing
//! on an expired lease serialize; the second sees the first one's fresh grant
//! and is denied.

mod manager;
mod record;


pub use manager::{AcquireOutcome, ActiveLease, LeaseManager, ReleaseOutcome};
pub use record::LeaseRecord;
