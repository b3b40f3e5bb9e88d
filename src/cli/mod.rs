//! CLI commands

pub mod context;
pub mod rebase;
pub mod status;
pub mod style;
pub mod sweep;

use crate::cli::style::{Stylize, check};
use anstream::println;
use pr_rebaser::update::CycleOutcome;

/// Print how an update cycle ended
pub fn print_cycle_outcome(locator: &str, outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Rebased { new_head } => println!(
            "{} Rebased {} (new head {})",
            check(),
            locator.emphasis(),
            new_head.accent()
        ),
        CycleOutcome::RebaseFailed(kind) => println!(
            "{}",
            format!("Rebase of {locator} failed ({kind:?}); retry suppressed during cooldown")
                .warn()
        ),
        CycleOutcome::CoolingDown => println!(
            "{}",
            format!("{locator} failed to rebase recently, skipped").muted()
        ),
        CycleOutcome::UpToDate => println!("{}", format!("{locator} is up to date").muted()),
        CycleOutcome::Closed => println!("{}", format!("{locator} is closed").muted()),
        CycleOutcome::Fork => println!(
            "{}",
            format!("{locator} comes from a fork and cannot be updated").muted()
        ),
        CycleOutcome::NotMergeable => {
            println!("{}", format!("{locator} has merge conflicts").warn());
        }
        CycleOutcome::Exhausted => println!(
            "{}",
            format!("Gave up waiting for {locator} to become updatable").warn()
        ),
        CycleOutcome::Aborted => println!("{}", format!("Update of {locator} aborted").warn()),
    }
}
