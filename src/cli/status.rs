//! Status command - replay a commit status event

use crate::cli::context::CommandContext;
use crate::cli::print_cycle_outcome;
use crate::cli::style::{Stylize, check};
use anstream::println;
use pr_rebaser::error::{Error, Result};
use pr_rebaser::merge::LabelMerger;
use pr_rebaser::status::{StatusAction, StatusEvent, StatusHandler};
use std::path::Path;
use std::sync::Arc;

/// Parse a `status` webhook payload from disk
pub fn read_status_event(path: &Path) -> Result<StatusEvent> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse status payload: {e}")))
}

/// Run the status command, waiting for any update cycle it starts
pub async fn run_status(ctx: &CommandContext, event: &StatusEvent) -> Result<()> {
    let merger = Arc::new(LabelMerger::new(
        Arc::clone(&ctx.repo),
        ctx.config.merge.clone(),
    ));
    let handler = StatusHandler::new(ctx.coordinator.clone(), merger);

    match handler.handle(event).await? {
        StatusAction::Ignored => println!("{}", "Nothing to do for this event.".muted()),
        StatusAction::NoPullRequests => {
            println!("{}", "Status change affects no open pull requests.".muted());
        }
        StatusAction::Rescheduled(None) => {
            println!("{}", "No pull request needs updating.".muted());
        }
        StatusAction::Rescheduled(Some(handle)) => {
            let locator = handle.locator().to_string();
            println!("Updating {}...", locator.emphasis());
            let outcome = handle.join().await;
            print_cycle_outcome(&locator, &outcome);
        }
        StatusAction::Processed { merged } if merged.is_empty() => {
            println!("{}", "No pull request was merged.".muted());
        }
        StatusAction::Processed { merged } => {
            for number in merged {
                println!("{} Merged #{}", check(), number.to_string().accent());
            }
        }
    }

    Ok(())
}
