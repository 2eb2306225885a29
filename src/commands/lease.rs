//! Implementation of the `holdfast lease` subcommands.

use crate::cli::{LeaseAcquireArgs, LeaseReleaseArgs, LeaseStatusArgs};
use crate::context::owner_string;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::exit_codes;
use crate::lease::{AcquireOutcome, ReleaseOutcome};
use std::time::Duration;

/// Execute the `holdfast lease acquire` command.
pub fn cmd_acquire(coordinator: &Coordinator, args: LeaseAcquireArgs) -> Result<i32> {
    let holder = args.holder.unwrap_or_else(owner_string);
    let ttl = args.ttl_secs.map(Duration::from_secs);

    match coordinator.acquire_lease(&args.resource, &holder, ttl)? {
        AcquireOutcome::Granted(record) => {
            println!(
                "Acquired lease on '{}' for {} ({})",
                args.resource,
                record.holder_id,
                format_remaining(record.ttl_or(Duration::ZERO))
            );
            Ok(exit_codes::SUCCESS)
        }
        AcquireOutcome::Denied {
            holder_id,
            remaining,
        } => {
            eprintln!(
                "Lease on '{}' is held by {} for another {}.",
                args.resource,
                holder_id,
                format_remaining(remaining)
            );
            Ok(exit_codes::CONTENTION)
        }
    }
}

/// Execute the `holdfast lease release` command.
pub fn cmd_release(coordinator: &Coordinator, args: LeaseReleaseArgs) -> Result<i32> {
    let holder = args.holder.unwrap_or_else(owner_string);

    match coordinator.release_lease(&args.resource, &holder)? {
        ReleaseOutcome::Released => {
            println!("Released lease on '{}'", args.resource);
            Ok(exit_codes::SUCCESS)
        }
        ReleaseOutcome::NotHolder { current } => {
            match current {
                Some(current) => eprintln!(
                    "Lease on '{}' is recorded for {}, not {}; nothing released.",
                    args.resource, current, holder
                ),
                None => eprintln!("No lease on '{}' to release.", args.resource),
            }
            Ok(exit_codes::CONTENTION)
        }
    }
}

/// Execute the `holdfast lease status` command.
pub fn cmd_status(coordinator: &Coordinator, args: LeaseStatusArgs) -> Result<i32> {
    match coordinator.lease_status(&args.resource)? {
        Some(lease) => println!("{}: {}", args.resource, lease),
        None => println!("{}: free", args.resource),
    }
    Ok(exit_codes::SUCCESS)
}

/// Whole seconds, rounded up so a live lease never reads as "0s".
pub(super) fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    format!("{}s", secs)
}
