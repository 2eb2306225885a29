//! Implementation of the `holdfast events` command.

use crate::cli::EventsArgs;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::events::Event;
use crate::exit_codes;

/// Execute the `holdfast events` command.
pub fn cmd_events(coordinator: &Coordinator, args: EventsArgs) -> Result<i32> {
    let events = coordinator.events().read_last(args.tail);

    if events.is_empty() {
        println!("No events recorded.");
    }
    for event in &events {
        println!("{}", format_event(event));
    }

    Ok(exit_codes::SUCCESS)
}

pub(super) fn format_event(event: &Event) -> String {
    let mut line = format!(
        "{} {:<14} {} by {}",
        event.ts.format("%Y-%m-%d %H:%M:%S"),
        event.action.to_string(),
        event.subject,
        event.actor
    );

    if event.details.as_object().is_some_and(|d| !d.is_empty()) {
        line.push(' ');
        line.push_str(&event.details.to_string());
    }
    line
}
