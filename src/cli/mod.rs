//! CLI argument parsing for holdfast.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Holdfast: singleton tasks and leases coordinated through a shared directory.
///
/// Every cooperating process points at the same workspace root:
/// - task progress lives in `tasks/<name>.json`
/// - leases live in `leases/<resource>.json`
/// - an audit trail is appended to `events.ndjson`
#[derive(Parser, Debug)]
#[command(name = "holdfast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Workspace root shared by all participants.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for holdfast.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a task and follow it to the end.
    ///
    /// This process hosts the execution, so it stays in the foreground
    /// until the task completes or fails.
    Start(StartArgs),

    /// Show a task's progress.
    ///
    /// With --watch, keeps polling until the task stops.
    Progress(ProgressArgs),

    /// Reset a completed task to the idle state.
    Reset(ResetArgs),

    /// Lease management commands.
    ///
    /// Take and give back time-bounded resource leases.
    Lease(LeaseCommand),

    /// Show recent entries of the audit log.
    Events(EventsArgs),
}

/// Arguments for the `start` command.
#[derive(Parser, Debug)]
pub struct StartArgs {
    /// Task name (e.g., build).
    pub task: String,

    /// Do not print progress while waiting.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `progress` command.
#[derive(Parser, Debug)]
pub struct ProgressArgs {
    /// Task name.
    pub task: String,

    /// Keep polling until the task completes or stops.
    #[arg(short, long)]
    pub watch: bool,

    /// Poll interval in milliseconds (defaults to the config value).
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Give up watching after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Arguments for the `reset` command.
#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Task name.
    pub task: String,
}

/// Lease subcommands.
#[derive(Parser, Debug)]
pub struct LeaseCommand {
    #[command(subcommand)]
    pub action: LeaseAction,
}

/// Available lease actions.
#[derive(Subcommand, Debug)]
pub enum LeaseAction {
    /// Acquire or refresh a lease.
    ///
    /// Fails with the contention exit code while someone else holds it.
    Acquire(LeaseAcquireArgs),

    /// Release a lease you hold.
    Release(LeaseReleaseArgs),

    /// Show the live holder of a lease.
    Status(LeaseStatusArgs),
}

/// Arguments for the `lease acquire` command.
#[derive(Parser, Debug)]
pub struct LeaseAcquireArgs {
    /// Resource name.
    pub resource: String,

    /// Holder identity (defaults to user@host).
    #[arg(long)]
    pub holder: Option<String>,

    /// Lease duration in seconds (defaults to the config value).
    #[arg(long)]
    pub ttl_secs: Option<u64>,
}

/// Arguments for the `lease release` command.
#[derive(Parser, Debug)]
pub struct LeaseReleaseArgs {
    /// Resource name.
    pub resource: String,

    /// Holder identity (defaults to user@host).
    #[arg(long)]
    pub holder: Option<String>,
}

/// Arguments for the `lease status` command.
#[derive(Parser, Debug)]
pub struct LeaseStatusArgs {
    /// Resource name.
    pub resource: String,
}

/// Arguments for the `events` command.
#[derive(Parser, Debug)]
pub struct EventsArgs {
    /// Number of most recent events to show.
    #[arg(long, default_value_t = 20)]
    pub tail: usize,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
