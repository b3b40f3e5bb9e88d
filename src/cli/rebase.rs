//! Rebase command - rebase one pull request now

use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, check};
use anstream::println;
use pr_rebaser::error::Result;
use pr_rebaser::update::TryRebase;

/// Run the rebase command
///
/// Skips the update policy and the failure cooldown, but still takes the
/// rebase lock. A failure is recorded like any other.
pub async fn run_rebase(ctx: &CommandContext, number: u64) -> Result<()> {
    let pr = ctx.repo.get_pull_request(number).await?;
    let locator = ctx.coordinator.locator(&pr);

    println!(
        "Rebasing {} ({}) onto {}...",
        locator.to_string().emphasis(),
        pr.head_ref.accent(),
        pr.base_ref.accent()
    );

    match ctx.coordinator.try_rebase(&pr).await {
        Ok(TryRebase::Rebased(summary)) => {
            ctx.coordinator.state().failures.clear(number);
            println!(
                "{} Replayed {} commit(s), new head {}",
                check(),
                summary.replayed,
                summary.new_head.accent()
            );
            Ok(())
        }
        Ok(TryRebase::AlreadyLocked) => {
            println!("{}", "Another rebase is in progress".muted());
            Ok(())
        }
        Err(e) => {
            ctx.coordinator.state().failures.record_failure(number);
            Err(e)
        }
    }
}
