//! Command implementations for holdfast.
//!
//! Each handler returns the process exit code. Errors carry their own code
//! through [`HoldfastError::exit_code`](crate::error::HoldfastError::exit_code);
//! contention outcomes (a busy task, a held lease) are not errors and map to
//! [`exit_codes::CONTENTION`](crate::exit_codes::CONTENTION) here.

mod events;
mod lease;
mod task;

#[cfg(test)]
mod tests;

use crate::cli::{Command, LeaseAction, LeaseCommand};
use crate::coordinator::Coordinator;
use crate::error::Result;
use std::path::Path;

/// Dispatch a command to its implementation.
pub fn dispatch(root: Option<&Path>, command: Command) -> Result<i32> {
    let coordinator = Coordinator::open(root)?;
    run(&coordinator, command)
}

pub(crate) fn run(coordinator: &Coordinator, command: Command) -> Result<i32> {
    match command {
        Command::Start(args) => task::cmd_start(coordinator, args),
        Command::Progress(args) => task::cmd_progress(coordinator, args),
        Command::Reset(args) => task::cmd_reset(coordinator, args),
        Command::Lease(lease_cmd) => dispatch_lease(coordinator, lease_cmd),
        Command::Events(args) => events::cmd_events(coordinator, args),
    }
}

/// Dispatch lease subcommands.
fn dispatch_lease(coordinator: &Coordinator, lease_cmd: LeaseCommand) -> Result<i32> {
    match lease_cmd.action {
        LeaseAction::Acquire(args) => lease::cmd_acquire(coordinator, args),
        LeaseAction::Release(args) => lease::cmd_release(coordinator, args),
        LeaseAction::Status(args) => lease::cmd_status(coordinator, args),
    }
}
