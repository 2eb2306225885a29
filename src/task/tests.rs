//! Tests for the task runner, checkpoints, and poller.

use super::*;
use crate::error::HoldfastError;
use crate::store::StateStore;
use crate::test_support::TestWorkspace;
use chrono::Utc;
use std::ops::ControlFlow;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Work that checkpoints once and then waits for the test to let it finish.
fn gated_work(
    release: mpsc::Receiver<()>,
) -> impl FnOnce(&mut Checkpoints) -> crate::error::Result<()> + Send + 'static {
    move |checkpoints| {
        checkpoints.checkpoint(0.1)?;
        let _ = release.recv();
        Ok(())
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not met in time");
}

#[test]
fn test_default_state_serializes_without_absent_fields() {
    let json = serde_json::to_string(&TaskState::default()).unwrap();
    assert_eq!(json, r#"{"running":false,"progress":0.0}"#);

    let parsed: TaskState = serde_json::from_str("{}").unwrap();
    assert_eq!(parsed, TaskState::default());
}

#[test]
fn test_state_helpers() {
    let mut state = TaskState {
        progress: 0.426,
        running: true,
        ..TaskState::default()
    };
    assert_eq!(state.percent(), 43);
    assert!(!state.is_finished());

    state.progress = 1.0;
    assert!(state.is_finished());
    assert!(!state.is_completed());

    state.running = false;
    assert!(state.is_completed());
}

#[test]
fn test_progress_report_display() {
    let report = ProgressReport {
        task: "build".to_string(),
        state: TaskState {
            running: true,
            progress: 0.4,
            ..TaskState::default()
        },
        stale: false,
    };
    assert_eq!(report.to_string(), "build:  40% running");

    let stale = ProgressReport {
        stale: true,
        ..report
    };
    assert!(stale.to_string().contains("stale"));
}

#[test]
fn test_checkpoints_never_move_backward_or_past_one() {
    let tw = TestWorkspace::new();
    let store = tw.runner().store("build").unwrap();
    let mut checkpoints = Checkpoints::new("build", store.clone());

    assert_eq!(checkpoints.checkpoint(0.5).unwrap(), 0.5);
    assert_eq!(checkpoints.checkpoint(0.2).unwrap(), 0.5);
    assert_eq!(checkpoints.checkpoint(1.7).unwrap(), 1.0);
    assert_eq!(checkpoints.progress(), 1.0);
    assert_eq!(checkpoints.task(), "build");

    let err = checkpoints.checkpoint(f64::NAN).unwrap_err();
    assert!(matches!(err, HoldfastError::TaskFailed(_)));

    let state = store.load().unwrap();
    assert_eq!(state.progress, 1.0);
    assert!(state.last_updated.is_some());
}

#[test]
fn test_start_twice_yields_one_started() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let (tx, rx) = mpsc::channel();

    assert_eq!(
        runner.start("build", gated_work(rx)).unwrap(),
        StartOutcome::Started
    );
    assert_eq!(
        runner.start("build", |_| Ok(())).unwrap(),
        StartOutcome::AlreadyRunning
    );
    assert!(runner.is_running("build"));

    tx.send(()).unwrap();
    assert!(runner.wait("build"));
    assert!(!runner.is_running("build"));

    let state = runner.store("build").unwrap().load().unwrap();
    assert!(!state.running);
    assert_eq!(state.progress, 1.0);
    assert!(state.completed_at.is_some());
}

#[test]
fn test_start_from_second_process_is_blocked() {
    let tw = TestWorkspace::new();
    // Two registries over one workspace stand in for two processes.
    let first = tw.runner();
    let second = tw.runner();
    let (tx, rx) = mpsc::channel();

    assert_eq!(
        first.start("build", gated_work(rx)).unwrap(),
        StartOutcome::Started
    );
    assert_eq!(
        second.start("build", |_| Ok(())).unwrap(),
        StartOutcome::Blocked
    );

    let report = second.report("build").unwrap();
    assert!(report.state.running);
    assert!(!report.stale);

    tx.send(()).unwrap();
    first.wait("build");

    assert_eq!(
        second.start("build", |_| Ok(())).unwrap(),
        StartOutcome::Started
    );
    second.wait("build");
}

#[test]
fn test_momentary_lock_by_reader_does_not_block_start() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let run_lock = tw.workspace.task_run_lock_path("build").unwrap();

    // A concurrent `report` on a stale record takes the lock for an instant.
    let crate::fs::Probe::Acquired(held) = crate::fs::try_exclusive(&run_lock).unwrap() else {
        panic!("lock should be free");
    };
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(2));
        drop(held);
    });

    assert_eq!(
        runner.start("build", |_| Ok(())).unwrap(),
        StartOutcome::Started
    );
    releaser.join().unwrap();
    runner.wait("build");
}

#[test]
fn test_start_persists_fresh_running_state() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let store = runner.store("build").unwrap();
    store
        .save(&TaskState {
            progress: 1.0,
            completed_at: Some(Utc::now()),
            last_error: Some("old".to_string()),
            ..TaskState::default()
        })
        .unwrap();

    let (tx, rx) = mpsc::channel::<()>();
    let before = Utc::now();
    runner
        .start("build", move |_| {
            let _ = rx.recv();
            Ok(())
        })
        .unwrap();

    let state = store.load().unwrap();
    assert!(state.running);
    assert_eq!(state.progress, 0.0);
    assert!(state.started_at.is_some_and(|ts| ts >= before));
    assert!(state.completed_at.is_none());
    assert!(state.last_error.is_none());

    tx.send(()).unwrap();
    runner.wait("build");
}

#[test]
fn test_progress_sequence_is_monotonic() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let job = PlaceholderJob::new(10, Duration::from_millis(20));

    runner.start("build", move |c| job.run(c)).unwrap();

    let poller = Poller::new(runner.store("build").unwrap(), Duration::from_millis(5))
        .with_timeout(Duration::from_secs(10));
    let mut seen = Vec::new();
    let outcome = poller
        .poll(|state| {
            seen.push(state.progress);
            ControlFlow::Continue(())
        })
        .unwrap();

    assert!(matches!(outcome, PollOutcome::Completed(_)));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
    runner.wait("build");
}

#[test]
fn test_build_scenario_late_poller_sees_completion() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let job = PlaceholderJob::new(10, Duration::from_millis(50));

    assert_eq!(
        runner.start("build", move |c| job.run(c)).unwrap(),
        StartOutcome::Started
    );
    thread::sleep(Duration::from_millis(120));

    let poller = Poller::new(runner.store("build").unwrap(), Duration::from_millis(10))
        .with_timeout(Duration::from_secs(10));
    let mut seen = Vec::new();
    let outcome = poller
        .poll(|state| {
            seen.push(state.progress);
            ControlFlow::Continue(())
        })
        .unwrap();

    assert!(seen[0] > 0.0, "poller started late, first sample {}", seen[0]);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");

    let PollOutcome::Completed(last) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert!(!last.running);
    assert_eq!(last.progress, 1.0);
    assert!(last.completed_at.is_some());
    runner.wait("build");
}

#[test]
fn test_failing_work_clears_running_and_keeps_progress() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();

    runner
        .start("build", |c| {
            c.checkpoint(0.3)?;
            Err(HoldfastError::TaskFailed("disk exploded".to_string()))
        })
        .unwrap();
    runner.wait("build");

    let state = runner.store("build").unwrap().load().unwrap();
    assert!(!state.running);
    assert_eq!(state.progress, 0.3);
    assert!(state.completed_at.is_none());
    assert!(state.last_error.unwrap().contains("disk exploded"));

    let report = runner.report("build").unwrap();
    assert!(!report.stale);
    assert!(report.to_string().contains("failed"));

    // Not wedged: the task can run again.
    assert_eq!(
        runner.start("build", |_| Ok(())).unwrap(),
        StartOutcome::Started
    );
    runner.wait("build");
}

#[test]
fn test_panicking_work_clears_running() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();

    runner
        .start("build", |c| {
            c.checkpoint(0.5)?;
            panic!("boom");
        })
        .unwrap();
    assert!(runner.wait("build"));

    let state = runner.store("build").unwrap().load().unwrap();
    assert!(!state.running);
    assert_eq!(state.progress, 0.5);
    assert_eq!(state.last_error.as_deref(), Some("work function panicked"));

    assert!(!crate::fs::is_locked(tw.workspace.task_run_lock_path("build").unwrap()).unwrap());
}

#[test]
fn test_reset_before_completion_is_refused() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let store = runner.store("build").unwrap();
    let partial = TaskState {
        progress: 0.6,
        last_error: Some("stopped".to_string()),
        ..TaskState::default()
    };
    store.save(&partial).unwrap();

    assert_eq!(runner.reset("build").unwrap(), ResetOutcome::NotCompleted);
    assert_eq!(store.load().unwrap(), partial);
}

#[test]
fn test_reset_while_running_is_refused() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let (tx, rx) = mpsc::channel();
    runner.start("build", gated_work(rx)).unwrap();

    assert_eq!(runner.reset("build").unwrap(), ResetOutcome::NotCompleted);

    tx.send(()).unwrap();
    runner.wait("build");
}

#[test]
fn test_reset_after_completion_returns_to_idle() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    runner.start("build", |_| Ok(())).unwrap();
    runner.wait("build");

    assert_eq!(runner.reset("build").unwrap(), ResetOutcome::Reset);
    assert_eq!(
        runner.store("build").unwrap().load().unwrap(),
        TaskState::default()
    );
}

#[test]
fn test_crashed_runner_is_reported_stale_and_restartable() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let store = runner.store("build").unwrap();
    store
        .save(&TaskState {
            running: true,
            progress: 0.4,
            started_at: Some(Utc::now()),
            last_updated: Some(Utc::now()),
            ..TaskState::default()
        })
        .unwrap();

    let report = runner.report("build").unwrap();
    assert!(report.stale);

    assert_eq!(
        runner.start("build", |_| Ok(())).unwrap(),
        StartOutcome::Started
    );
    runner.wait("build");
    assert!(store.load().unwrap().is_completed());
}

#[test]
fn test_corrupt_state_is_repaired_by_start() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let store = runner.store("build").unwrap();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{{{{").unwrap();

    assert_eq!(runner.report("build").unwrap().state, TaskState::default());
    runner.start("build", |_| Ok(())).unwrap();
    runner.wait("build");
    assert!(store.load().unwrap().is_completed());
}

#[test]
fn test_task_transitions_are_audited() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    runner.start("build", |_| Ok(())).unwrap();
    runner.wait("build");
    runner.reset("build").unwrap();

    let actions: Vec<_> = tw
        .events()
        .read_last(10)
        .iter()
        .map(|e| e.action.to_string())
        .collect();
    assert_eq!(actions, ["task_start", "task_complete", "task_reset"]);
}

#[test]
fn test_invalid_task_name_is_rejected() {
    let tw = TestWorkspace::new();
    let err = tw.runner().start("../x", |_| Ok(())).unwrap_err();
    assert!(matches!(err, HoldfastError::UserError(_)));
}

#[test]
fn test_wait_without_execution() {
    let tw = TestWorkspace::new();
    assert!(!tw.runner().wait("build"));
}

#[test]
fn test_poller_stops_when_task_not_running() {
    let tw = TestWorkspace::new();
    let store: StateStore<TaskState> = tw.runner().store("build").unwrap();
    store
        .save(&TaskState {
            progress: 0.3,
            ..TaskState::default()
        })
        .unwrap();

    let outcome = Poller::new(store, Duration::from_millis(5))
        .poll(|_| ControlFlow::Continue(()))
        .unwrap();
    assert!(matches!(outcome, PollOutcome::Stopped(_)));
    assert_eq!(outcome.state().progress, 0.3);
}

#[test]
fn test_poller_times_out_on_wedged_record() {
    let tw = TestWorkspace::new();
    let store = tw.runner().store("build").unwrap();
    store
        .save(&TaskState {
            running: true,
            progress: 0.2,
            ..TaskState::default()
        })
        .unwrap();

    let mut samples = 0;
    let outcome = Poller::new(store, Duration::from_millis(5))
        .with_timeout(Duration::from_millis(50))
        .poll(|_| {
            samples += 1;
            ControlFlow::Continue(())
        })
        .unwrap();

    assert!(matches!(outcome, PollOutcome::TimedOut(_)));
    assert!(samples > 1);
}

#[test]
fn test_poller_detaches_on_break() {
    let tw = TestWorkspace::new();
    let store = tw.runner().store("build").unwrap();
    store
        .save(&TaskState {
            running: true,
            ..TaskState::default()
        })
        .unwrap();

    let outcome = Poller::new(store, Duration::from_millis(5))
        .poll(|_| ControlFlow::Break(()))
        .unwrap();
    assert!(matches!(outcome, PollOutcome::Detached(_)));
}

#[test]
fn test_many_pollers_observe_concurrently() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let job = PlaceholderJob::new(5, Duration::from_millis(20));
    runner.start("build", move |c| job.run(c)).unwrap();

    let pollers: Vec<_> = (0..3)
        .map(|_| {
            let poller = Poller::new(runner.store("build").unwrap(), Duration::from_millis(5))
                .with_timeout(Duration::from_secs(10));
            thread::spawn(move || poller.poll(|_| ControlFlow::Continue(())).unwrap())
        })
        .collect();

    for poller in pollers {
        assert!(matches!(poller.join().unwrap(), PollOutcome::Completed(_)));
    }
    runner.wait("build");
}

#[test]
fn test_start_returns_without_waiting() {
    let tw = TestWorkspace::new();
    let runner = tw.runner();
    let started = std::time::Instant::now();
    let job = PlaceholderJob::new(4, Duration::from_millis(100));

    runner.start("build", move |c| job.run(c)).unwrap();

    assert!(started.elapsed() < Duration::from_millis(300));
    wait_until(|| runner.store("build").unwrap().load().unwrap().progress > 0.0);
    runner.wait("build");
}
