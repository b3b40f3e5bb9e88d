//! Update orchestration
//!
//! Wraps the rebase engine with the global single-flight lock, decides which
//! pull requests are eligible, and starts background update cycles.

use crate::error::Result;
use crate::platform::RemoteRepository;
use crate::rebase::{RebaseEngine, RebaseSummary};
use crate::types::{PrState, PullRequestDetails, PullRequestLocator};
use crate::update::cycle::{PollSettings, SuccessCallback, UpdateCycleHandle, spawn_cycle};
use crate::update::policy::{UpdateConfig, UpdatePolicy, should_update};
use crate::update::state::UpdateState;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a locked rebase attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryRebase {
    /// Another rebase holds the lock; nothing was done
    AlreadyLocked,
    /// The PR was rebased
    Rebased(RebaseSummary),
}

/// A PR that is eligible and behind its base
#[derive(Debug, Clone)]
pub struct UpdateCandidate {
    /// PR details at filtering time
    pub pr: PullRequestDetails,
    /// Locator of the PR
    pub locator: PullRequestLocator,
}

/// Coordinates updates for one repository
///
/// Coordinators for different repositories share one [`UpdateState`], so
/// the rebase lock and registries are process-wide.
#[derive(Clone)]
pub struct UpdateCoordinator {
    repo: Arc<dyn RemoteRepository>,
    policy: Arc<dyn UpdatePolicy>,
    state: Arc<UpdateState>,
    config: UpdateConfig,
    settings: PollSettings,
}

impl UpdateCoordinator {
    /// Create a coordinator
    pub fn new(
        repo: Arc<dyn RemoteRepository>,
        policy: Arc<dyn UpdatePolicy>,
        state: Arc<UpdateState>,
        config: UpdateConfig,
        settings: PollSettings,
    ) -> Self {
        Self {
            repo,
            policy,
            state,
            config,
            settings,
        }
    }

    /// Remote repository this coordinator serves
    pub fn repo(&self) -> &Arc<dyn RemoteRepository> {
        &self.repo
    }

    /// Shared update state
    pub fn state(&self) -> &Arc<UpdateState> {
        &self.state
    }

    /// Poll timing
    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Locator for a PR of this repository
    pub fn locator(&self, pr: &PullRequestDetails) -> PullRequestLocator {
        PullRequestLocator::new(self.repo.config(), pr)
    }

    /// Rebase under the global lock, without waiting for it
    ///
    /// The lock is released before returning on every path.
    pub async fn try_rebase(&self, pr: &PullRequestDetails) -> Result<TryRebase> {
        let Some(_guard) = self.state.lock.try_acquire() else {
            debug!(pr_number = pr.number, "rebase lock already held");
            return Ok(TryRebase::AlreadyLocked);
        };

        RebaseEngine::new(Arc::clone(&self.repo))
            .rebase(pr)
            .await
            .map(TryRebase::Rebased)
    }

    /// Whether the policy allows keeping this PR up to date
    pub async fn should_update(&self, pr: &PullRequestDetails) -> Result<bool> {
        should_update(self.policy.as_ref(), pr, &self.config).await
    }

    /// Whether the PR is open, pushable, not conflicting, and behind its base
    ///
    /// Re-fetches the PR so the answer reflects its current head.
    pub async fn is_behind_base(&self, pr: &PullRequestDetails) -> Result<bool> {
        let current = self.repo.get_pull_request(pr.number).await?;

        if current.state != PrState::Open
            || current.is_definitively_unmergeable()
            || current.head_is_fork
        {
            return Ok(false);
        }

        let comparison = self
            .repo
            .compare_commits(&current.base_ref, &current.head_sha)
            .await?;
        Ok(comparison.behind_by > 0)
    }

    /// Start a background update cycle for a PR
    ///
    /// The PR is marked active for the lifetime of the cycle. On success
    /// `on_success` receives its locator string and owns the active entry;
    /// any other ending clears it.
    pub fn start_update_cycle(
        &self,
        pr: &PullRequestDetails,
        base_ref: &str,
        on_success: SuccessCallback,
    ) -> UpdateCycleHandle {
        let locator = self.locator(pr);
        info!(%locator, base_ref, "starting update cycle");
        spawn_cycle(self.clone(), locator, base_ref.to_string(), on_success)
    }

    /// Keep only PRs that are eligible and behind their base
    ///
    /// PRs whose status cannot be determined are skipped.
    pub async fn filter_updatable(&self, prs: Vec<PullRequestDetails>) -> Vec<UpdateCandidate> {
        let mut result = Vec::new();

        for pr in prs {
            let can_update = match self.should_update(&pr).await {
                Ok(can_update) => can_update,
                Err(e) => {
                    debug!(pr_number = pr.number, error = %e, "unable to determine whitelist status");
                    continue;
                }
            };
            if !can_update {
                continue;
            }

            match self.is_behind_base(&pr).await {
                Ok(true) => {
                    let locator = self.locator(&pr);
                    result.push(UpdateCandidate { pr, locator });
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(pr_number = pr.number, error = %e, "unable to determine update status");
                }
            }
        }

        result
    }

    /// Start a cycle for the oldest candidate
    ///
    /// Does nothing when a rebase is in flight, another update is active, or
    /// there are no candidates.
    pub fn select_oldest_and_update(
        &self,
        mut candidates: Vec<UpdateCandidate>,
    ) -> Option<UpdateCycleHandle> {
        if candidates.is_empty() {
            return None;
        }
        if self.state.lock.is_locked() {
            debug!("rebase in progress, not selecting another pull request");
            return None;
        }

        // Sort by creation time, oldest first
        candidates.sort_by_key(|c| c.pr.created_at);
        let oldest = candidates.swap_remove(0);

        // Checked and enrolled under one lock; the cycle re-enrolls the same key
        if !self
            .state
            .active
            .try_enroll_exclusive(&oldest.locator.locator())
        {
            debug!("other pull requests are being updated");
            return None;
        }

        Some(self.start_update_cycle(
            &oldest.pr,
            &oldest.pr.base_ref,
            self.clear_on_success(),
        ))
    }

    /// Explicit update request for one PR
    pub async fn update_pull_request(
        &self,
        pr: &PullRequestDetails,
        base_ref: &str,
    ) -> Result<Option<UpdateCycleHandle>> {
        if !self.should_update(pr).await? {
            debug!(pr_number = pr.number, "pull request should not be updated");
            return Ok(None);
        }

        debug!(pr_number = pr.number, "pull request should be updated");
        Ok(Some(self.start_update_cycle(
            pr,
            base_ref,
            self.clear_on_success(),
        )))
    }

    fn clear_on_success(&self) -> SuccessCallback {
        let state = Arc::clone(&self.state);
        Box::new(move |locator: &str| {
            state.active.clear_active(locator);
        })
    }

    /// Enroll a PR in the active registry
    pub fn mark_active(&self, locator: &str) {
        self.state.active.mark_active(locator);
    }

    /// Remove a PR from the active registry, reporting prior presence
    pub fn clear_active(&self, locator: &str) -> bool {
        self.state.active.clear_active(locator)
    }

    /// Whether any PR is under active update
    pub fn any_active(&self) -> bool {
        self.state.active.any_active()
    }
}
