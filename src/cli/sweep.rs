//! Sweep command - update the oldest eligible pull request

use crate::cli::context::CommandContext;
use crate::cli::print_cycle_outcome;
use crate::cli::style::Stylize;
use anstream::println;
use pr_rebaser::error::Result;

/// Run the sweep command
///
/// Lists open PRs, keeps the eligible ones that are behind their base,
/// starts an update cycle for the oldest and waits for it to end.
pub async fn run_sweep(ctx: &CommandContext) -> Result<()> {
    let prs = ctx.repo.list_open_pull_requests().await?;
    println!(
        "{}",
        format!("Checking {} open pull request(s)...", prs.len()).muted()
    );

    let candidates = ctx.coordinator.filter_updatable(prs).await;
    if candidates.is_empty() {
        println!("{}", "No pull requests need updating.".muted());
        return Ok(());
    }

    let Some(handle) = ctx.coordinator.select_oldest_and_update(candidates) else {
        println!("{}", "Another update is already in progress.".muted());
        return Ok(());
    };

    let locator = handle.locator().to_string();
    println!("Updating {}...", locator.emphasis());
    let outcome = handle.join().await;
    print_cycle_outcome(&locator, &outcome);
    Ok(())
}
