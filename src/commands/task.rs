//! Implementation of the `holdfast start`, `progress`, and `reset` commands.

use crate::cli::{ProgressArgs, ResetArgs, StartArgs};
use crate::coordinator::Coordinator;
use crate::error::{HoldfastError, Result};
use crate::exit_codes;
use crate::task::{PollOutcome, ProgressReport, ResetOutcome, StartOutcome, TaskState};
use std::ops::ControlFlow;
use std::time::Duration;

/// Execute the `holdfast start` command.
///
/// The execution thread lives in this process, so the command follows the
/// task to its end instead of returning right after the start.
pub fn cmd_start(coordinator: &Coordinator, args: StartArgs) -> Result<i32> {
    match coordinator.start_task(&args.task)? {
        StartOutcome::Started => {}
        StartOutcome::AlreadyRunning => {
            eprintln!("Task '{}' is already running in this process.", args.task);
            return Ok(exit_codes::CONTENTION);
        }
        StartOutcome::Blocked => {
            eprintln!(
                "Task '{}' is already running in another process.",
                args.task
            );
            eprintln!("Follow it with: holdfast progress {} --watch", args.task);
            return Ok(exit_codes::CONTENTION);
        }
    }

    follow_to_end(coordinator, &args.task, || {
        if args.quiet {
            return Ok(());
        }
        println!("Started task '{}'", args.task);
        let mut printer = ChangePrinter::new(&args.task);
        coordinator
            .poller(&args.task)?
            .poll(|state| printer.observe(state))
            .map(|_| ())
    })?;

    let report = coordinator.get_progress(&args.task)?;
    if report.state.is_completed() {
        if !args.quiet {
            println!("{}", report);
        }
        Ok(exit_codes::SUCCESS)
    } else {
        Err(HoldfastError::TaskFailed(format!(
            "'{}' stopped at {}%: {}",
            args.task,
            report.state.percent(),
            report
                .state
                .last_error
                .as_deref()
                .unwrap_or("no error recorded")
        )))
    }
}

/// Execute the `holdfast progress` command.
pub fn cmd_progress(coordinator: &Coordinator, args: ProgressArgs) -> Result<i32> {
    let report = coordinator.get_progress(&args.task)?;

    if !args.watch || !report.state.running || report.stale {
        print_report(&report);
        return Ok(exit_codes::SUCCESS);
    }

    let mut poller = coordinator.poller(&args.task)?;
    if let Some(ms) = args.interval_ms {
        poller = poller.with_interval(Duration::from_millis(ms.max(1)));
    }
    if let Some(secs) = args.timeout_secs {
        poller = poller.with_timeout(Duration::from_secs(secs));
    }

    let mut printer = ChangePrinter::new(&args.task);
    let outcome = poller.poll(|state| printer.observe(state))?;

    match outcome {
        PollOutcome::Completed(_) | PollOutcome::Stopped(_) | PollOutcome::Detached(_) => {
            print_report(&coordinator.get_progress(&args.task)?);
        }
        PollOutcome::TimedOut(state) => {
            eprintln!(
                "Gave up waiting for '{}' at {}%.",
                args.task,
                state.percent()
            );
        }
    }

    Ok(exit_codes::SUCCESS)
}

/// Execute the `holdfast reset` command.
pub fn cmd_reset(coordinator: &Coordinator, args: ResetArgs) -> Result<i32> {
    match coordinator.reset_task(&args.task)? {
        ResetOutcome::Reset => {
            println!("Reset task '{}'", args.task);
            Ok(exit_codes::SUCCESS)
        }
        ResetOutcome::NotCompleted => {
            eprintln!(
                "Task '{}' has not completed; nothing was reset.",
                args.task
            );
            Ok(exit_codes::CONTENTION)
        }
    }
}

/// Run `follow`, then join this process's execution of `task` whether or not
/// following succeeded, so the process never exits under a live execution.
pub(super) fn follow_to_end<F>(coordinator: &Coordinator, task: &str, follow: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let followed = follow();
    coordinator.wait_task(task);
    followed
}

fn print_report(report: &ProgressReport) {
    println!("{}", report);
    if report.stale {
        eprintln!(
            "The runner of '{}' exited without cleaning up; `holdfast start {}` restarts it.",
            report.task, report.task
        );
    }
}

/// Prints a progress line whenever the whole percentage changes.
struct ChangePrinter<'a> {
    task: &'a str,
    last: Option<u32>,
}

impl<'a> ChangePrinter<'a> {
    fn new(task: &'a str) -> Self {
        Self { task, last: None }
    }

    fn observe(&mut self, state: &TaskState) -> ControlFlow<()> {
        let percent = state.percent();
        if self.last != Some(percent) {
            println!("  {}: {:>3}%", self.task, percent);
            self.last = Some(percent);
        }
        ControlFlow::Continue(())
    }
}
