//! Tests for the command handlers.

use super::events::format_event;
use super::lease::format_remaining;
use super::run;
use super::task::follow_to_end;
use crate::cli::*;
use crate::config::Config;
use crate::context::Workspace;
use crate::coordinator::Coordinator;
use crate::error::HoldfastError;
use crate::events::{Event, EventAction};
use crate::exit_codes;
use crate::fs::{Probe, try_exclusive};
use serde_json::json;
use std::time::Duration;
use tempfile::TempDir;

fn coordinator(temp: &TempDir) -> Coordinator {
    let config = Config {
        task_steps: 2,
        task_step_interval_ms: 10,
        poll_interval_ms: 5,
        ..Config::default()
    };
    Coordinator::new(Workspace::new(temp.path().join("shared")), config)
}

fn start(task: &str) -> Command {
    Command::Start(StartArgs {
        task: task.to_string(),
        quiet: true,
    })
}

fn reset(task: &str) -> Command {
    Command::Reset(ResetArgs {
        task: task.to_string(),
    })
}

fn lease(action: LeaseAction) -> Command {
    Command::Lease(LeaseCommand { action })
}

fn acquire(resource: &str, holder: &str, ttl_secs: Option<u64>) -> Command {
    lease(LeaseAction::Acquire(LeaseAcquireArgs {
        resource: resource.to_string(),
        holder: Some(holder.to_string()),
        ttl_secs,
    }))
}

fn release(resource: &str, holder: &str) -> Command {
    lease(LeaseAction::Release(LeaseReleaseArgs {
        resource: resource.to_string(),
        holder: Some(holder.to_string()),
    }))
}

#[test]
fn start_waits_for_completion() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);

    assert_eq!(run(&coordinator, start("build")).unwrap(), exit_codes::SUCCESS);
    assert!(coordinator.get_progress("build").unwrap().state.is_completed());
}

#[test]
fn start_without_quiet_follows_progress() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);
    let command = Command::Start(StartArgs {
        task: "build".to_string(),
        quiet: false,
    });

    assert_eq!(run(&coordinator, command).unwrap(), exit_codes::SUCCESS);
}

#[test]
fn failed_follow_still_waits_for_execution() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);
    coordinator.start_task("build").unwrap();

    let err = follow_to_end(&coordinator, "build", || {
        Err(HoldfastError::IoFailure("progress unreadable".to_string()))
    })
    .unwrap_err();

    assert!(matches!(err, HoldfastError::IoFailure(_)));
    assert!(!coordinator.wait_task("build"));
    assert!(coordinator.get_progress("build").unwrap().state.is_completed());
}

#[test]
fn start_blocked_by_other_process_is_contention() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);
    let run_lock = coordinator.workspace().task_run_lock_path("build").unwrap();
    let Probe::Acquired(_held) = try_exclusive(&run_lock).unwrap() else {
        panic!("lock should be free");
    };

    assert_eq!(
        run(&coordinator, start("build")).unwrap(),
        exit_codes::CONTENTION
    );
}

#[test]
fn start_rejects_invalid_name() {
    let temp = TempDir::new().unwrap();
    let err = run(&coordinator(&temp), start("a/b")).unwrap_err();
    assert!(matches!(err, HoldfastError::UserError(_)));
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn reset_requires_completion() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);

    assert_eq!(
        run(&coordinator, reset("build")).unwrap(),
        exit_codes::CONTENTION
    );

    run(&coordinator, start("build")).unwrap();
    assert_eq!(run(&coordinator, reset("build")).unwrap(), exit_codes::SUCCESS);
}

#[test]
fn progress_of_idle_task_succeeds() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);
    let command = Command::Progress(ProgressArgs {
        task: "build".to_string(),
        watch: true,
        interval_ms: Some(5),
        timeout_secs: Some(1),
    });

    assert_eq!(run(&coordinator, command).unwrap(), exit_codes::SUCCESS);
}

#[test]
fn lease_commands_map_outcomes_to_exit_codes() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);

    assert_eq!(
        run(&coordinator, acquire("workspace", "A", Some(5))).unwrap(),
        exit_codes::SUCCESS
    );
    assert_eq!(
        run(&coordinator, acquire("workspace", "B", Some(5))).unwrap(),
        exit_codes::CONTENTION
    );
    assert_eq!(
        run(&coordinator, release("workspace", "B")).unwrap(),
        exit_codes::CONTENTION
    );

    let status = lease(LeaseAction::Status(LeaseStatusArgs {
        resource: "workspace".to_string(),
    }));
    assert_eq!(run(&coordinator, status).unwrap(), exit_codes::SUCCESS);

    assert_eq!(
        run(&coordinator, release("workspace", "A")).unwrap(),
        exit_codes::SUCCESS
    );
    assert_eq!(
        run(&coordinator, release("workspace", "A")).unwrap(),
        exit_codes::CONTENTION
    );
}

#[test]
fn lease_acquire_rejects_zero_ttl() {
    let temp = TempDir::new().unwrap();
    let err = run(&coordinator(&temp), acquire("db", "A", Some(0))).unwrap_err();
    assert!(matches!(err, HoldfastError::UserError(_)));
}

#[test]
fn events_command_lists_audit_trail() {
    let temp = TempDir::new().unwrap();
    let coordinator = coordinator(&temp);
    run(&coordinator, acquire("db", "A", None)).unwrap();

    let command = Command::Events(EventsArgs { tail: 5 });
    assert_eq!(run(&coordinator, command).unwrap(), exit_codes::SUCCESS);
    assert_eq!(coordinator.events().read_last(5).len(), 1);
}

#[test]
fn remaining_rounds_up_to_whole_seconds() {
    assert_eq!(format_remaining(Duration::from_millis(2100)), "3s");
    assert_eq!(format_remaining(Duration::from_secs(3)), "3s");
    assert_eq!(format_remaining(Duration::from_millis(1)), "1s");
}

#[test]
fn event_line_shows_details_only_when_present() {
    let bare = Event::new(EventAction::TaskStart, "build").with_actor("ci@runner");
    let line = format_event(&bare);
    assert!(line.contains("task_start"));
    assert!(line.ends_with("build by ci@runner"));

    let detailed = bare.with_details(json!({ "ttl_secs": 5 }));
    assert!(format_event(&detailed).ends_with(r#"{"ttl_secs":5}"#));
}
