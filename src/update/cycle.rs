//! Background poll-and-rebase cycle
//!
//! A cycle waits one interval per tick. A tick ends the cycle as soon as it
//! reaches a definitive answer; it only lets the cycle continue when the
//! answer is not available yet:
//! - GitHub is still computing mergeability
//! - a remote read failed (the next tick is the retry)
//! - another rebase holds the lock

use crate::error::FailureKind;
use crate::types::{PrState, PullRequestLocator};
use crate::update::coordinator::{TryRebase, UpdateCoordinator};
use crate::update::state::UpdateState;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default wait before each tick
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of ticks per cycle
pub const DEFAULT_MAX_POLL_TICKS: u32 = 5;

/// Called with the locator string once the PR was rebased
pub type SuccessCallback = Box<dyn FnOnce(&str) + Send + 'static>;

/// Poll timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait before each tick
    pub interval: Duration,
    /// Maximum number of ticks
    pub max_ticks: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_ticks: DEFAULT_MAX_POLL_TICKS,
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// PR was closed or merged
    Closed,
    /// PR comes from a fork and cannot be pushed to
    Fork,
    /// PR has conflicts with its base
    NotMergeable,
    /// PR is not behind its base
    UpToDate,
    /// A rebase failed recently
    CoolingDown,
    /// PR was rebased
    Rebased {
        /// New head of the PR branch
        new_head: String,
    },
    /// Rebase failed; the failure was recorded
    RebaseFailed(FailureKind),
    /// No definitive answer within the allowed ticks
    Exhausted,
    /// The cycle was cancelled or its task panicked
    Aborted,
}

/// Handle to a running cycle
#[derive(Debug)]
pub struct UpdateCycleHandle {
    locator: String,
    join: JoinHandle<CycleOutcome>,
}

impl UpdateCycleHandle {
    /// Locator of the PR this cycle updates
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Cancel the cycle
    ///
    /// An in-flight rebase is dropped; its temporary ref is still deleted.
    pub fn cancel(&self) {
        self.join.abort();
    }

    /// Whether the cycle has ended
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the cycle to end
    pub async fn join(self) -> CycleOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_panic() {
                    error!(locator = %self.locator, "update cycle panicked");
                }
                CycleOutcome::Aborted
            }
        }
    }
}

/// Keeps a PR in the active registry for the lifetime of its cycle
///
/// Dropping it clears the entry unless it was handed to the success callback.
struct ActiveMembership {
    state: Arc<UpdateState>,
    locator: String,
    armed: bool,
}

impl ActiveMembership {
    fn enroll(state: Arc<UpdateState>, locator: String) -> Self {
        state.active.mark_active(&locator);
        Self {
            state,
            locator,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ActiveMembership {
    fn drop(&mut self) {
        if self.armed {
            self.state.active.clear_active(&self.locator);
        }
    }
}

enum Tick {
    Continue,
    Done(CycleOutcome),
}

/// Spawn a cycle for `locator`
pub(crate) fn spawn_cycle(
    coordinator: UpdateCoordinator,
    locator: PullRequestLocator,
    base_ref: String,
    on_success: SuccessCallback,
) -> UpdateCycleHandle {
    let key = locator.locator();
    let membership = ActiveMembership::enroll(Arc::clone(coordinator.state()), key.clone());
    let join = tokio::spawn(run_cycle(
        coordinator,
        locator,
        base_ref,
        membership,
        on_success,
    ));
    UpdateCycleHandle { locator: key, join }
}

async fn run_cycle(
    coordinator: UpdateCoordinator,
    locator: PullRequestLocator,
    base_ref: String,
    mut membership: ActiveMembership,
    on_success: SuccessCallback,
) -> CycleOutcome {
    let settings = *coordinator.settings();

    for tick in 1..=settings.max_ticks {
        tokio::time::sleep(settings.interval).await;
        debug!(%locator, tick, "polling pull request");

        if let Tick::Done(outcome) = poll_once(&coordinator, &locator, &base_ref).await {
            if matches!(outcome, CycleOutcome::Rebased { .. }) {
                membership.disarm();
                on_success(&locator.locator());
            }
            return outcome;
        }
    }

    debug!(%locator, ticks = settings.max_ticks, "update cycle exhausted");
    CycleOutcome::Exhausted
}

async fn poll_once(
    coordinator: &UpdateCoordinator,
    locator: &PullRequestLocator,
    base_ref: &str,
) -> Tick {
    let repo = coordinator.repo();
    let state = coordinator.state();

    let pr = match repo.get_pull_request(locator.number).await {
        Ok(pr) => pr,
        Err(e) => {
            error!(%locator, error = %e, "failed to retrieve pull request");
            return Tick::Continue;
        }
    };

    if pr.state != PrState::Open {
        debug!(%locator, "pull request already closed");
        return Tick::Done(CycleOutcome::Closed);
    }
    if pr.head_is_fork {
        debug!(%locator, "pull request is from a fork, cannot keep it up to date with base ref");
        return Tick::Done(CycleOutcome::Fork);
    }
    if pr.is_definitively_unmergeable() {
        debug!(%locator, "pull request is not in mergeable state");
        return Tick::Done(CycleOutcome::NotMergeable);
    }
    if pr.mergeable != Some(true) {
        debug!(%locator, "mergeability not computed yet");
        return Tick::Continue;
    }

    let comparison = match repo.compare_commits(base_ref, &pr.head_sha).await {
        Ok(comparison) => comparison,
        Err(e) => {
            error!(%locator, base_ref, head = %pr.head_sha, error = %e, "cannot compare base and head");
            return Tick::Continue;
        }
    };
    if comparison.behind_by == 0 {
        debug!(%locator, "pull request is not out of date, not updating");
        return Tick::Done(CycleOutcome::UpToDate);
    }
    debug!(%locator, behind_by = comparison.behind_by, "pull request is not up to date");

    if !state.failures.should_attempt(pr.number) {
        if let Some(failed_at) = state.failures.last_failure(pr.number) {
            info!(%locator, %failed_at, "rebase failed recently, aborting rebase");
        }
        return Tick::Done(CycleOutcome::CoolingDown);
    }

    match coordinator.try_rebase(&pr).await {
        Ok(TryRebase::AlreadyLocked) => {
            info!(%locator, "another rebase is in progress, retrying on next tick");
            Tick::Continue
        }
        Ok(TryRebase::Rebased(summary)) => {
            state.failures.clear(pr.number);
            info!(
                %locator,
                base_ref,
                new_head = %summary.new_head,
                replayed = summary.replayed,
                "successfully updated pull request from base ref as rebase"
            );
            Tick::Done(CycleOutcome::Rebased {
                new_head: summary.new_head,
            })
        }
        Err(e) => {
            warn!(%locator, error = %e, "failed to rebase pull request");
            state.failures.record_failure(pr.number);
            Tick::Done(CycleOutcome::RebaseFailed(e.failure_kind()))
        }
    }
}
