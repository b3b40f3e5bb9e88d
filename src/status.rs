//! Commit status events
//!
//! A status change on a commit is the main trigger of the bot. Failures of a
//! required status re-schedule the oldest eligible PR; successes either
//! re-schedule (the PR fell behind while building) or hand the PRs to the
//! merge step.

use crate::error::Result;
use crate::merge::MergeHandler;
use crate::types::PullRequestDetails;
use crate::update::{UpdateCoordinator, UpdateCycleHandle};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// State of a commit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    /// Check is running
    Pending,
    /// Check passed
    Success,
    /// Check failed
    Failure,
    /// Check errored
    Error,
    /// Anything GitHub adds later
    #[serde(other)]
    Unknown,
}

/// Owner of the repository in a status payload
#[derive(Debug, Clone, Deserialize)]
pub struct StatusOwner {
    /// Login name
    pub login: String,
}

/// Repository in a status payload
#[derive(Debug, Clone, Deserialize)]
pub struct StatusRepository {
    /// Repository name
    pub name: String,
    /// Repository owner
    pub owner: StatusOwner,
}

/// The subset of GitHub's `status` webhook payload the bot uses
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEvent {
    /// Commit the status belongs to
    pub sha: String,
    /// New state
    pub state: StatusState,
    /// Status context name (e.g. `ci/build`)
    pub context: String,
    /// Repository of the commit
    pub repository: StatusRepository,
}

/// What handling a status event led to
#[derive(Debug)]
pub enum StatusAction {
    /// Nothing to do for this event
    Ignored,
    /// The commit belongs to no open PR
    NoPullRequests,
    /// Another PR was selected for update (`None` when none qualified)
    Rescheduled(Option<UpdateCycleHandle>),
    /// PRs were handed to the merge step
    Processed {
        /// Numbers of the PRs that were merged
        merged: Vec<u64>,
    },
}

/// Handles status events for one repository
pub struct StatusHandler {
    coordinator: UpdateCoordinator,
    merger: Arc<dyn MergeHandler>,
}

impl StatusHandler {
    /// Create a handler
    pub fn new(coordinator: UpdateCoordinator, merger: Arc<dyn MergeHandler>) -> Self {
        Self {
            coordinator,
            merger,
        }
    }

    /// Handle one status event
    pub async fn handle(&self, event: &StatusEvent) -> Result<StatusAction> {
        let config = self.coordinator.repo().config();
        if !event.repository.owner.login.eq_ignore_ascii_case(&config.owner)
            || !event.repository.name.eq_ignore_ascii_case(&config.repo)
        {
            warn!(
                owner = %event.repository.owner.login,
                repo = %event.repository.name,
                "status event for a different repository"
            );
            return Ok(StatusAction::Ignored);
        }

        if event.state == StatusState::Pending {
            debug!(context = %event.context, "doing nothing since context state was pending");
            return Ok(StatusAction::Ignored);
        }

        let prs = self
            .coordinator
            .repo()
            .list_open_pull_requests_for_sha(&event.sha)
            .await?;

        let mut required = false;
        let mut was_active = false;
        for pr in &prs {
            required |= self.is_status_required(pr, &event.context).await;
            // Cleanup PR state
            was_active |= self
                .coordinator
                .clear_active(&self.coordinator.locator(pr).locator());
        }

        match event.state {
            StatusState::Failure | StatusState::Error => {
                // A recently rebased PR failed its checks, schedule another
                if required && (was_active || !self.coordinator.any_active()) {
                    return Ok(StatusAction::Rescheduled(self.try_update_another().await));
                }
                return Ok(StatusAction::Ignored);
            }
            StatusState::Success => {}
            StatusState::Pending | StatusState::Unknown => {
                error!(context = %event.context, state = ?event.state, "unexpected status state");
                return Ok(StatusAction::Ignored);
            }
        }

        if prs.is_empty() {
            debug!("status change event affects no open pull requests");
            return Ok(StatusAction::NoPullRequests);
        }

        // PR became outdated while building, reschedule update
        let still_behind = self.coordinator.filter_updatable(prs.clone()).await;
        if !still_behind.is_empty() {
            return Ok(StatusAction::Rescheduled(self.try_update_another().await));
        }

        let mut merged = Vec::new();
        for pr in &prs {
            match self.merger.process(pr).await {
                Ok(true) => merged.push(pr.number),
                Ok(false) => {}
                Err(e) => error!(pr_number = pr.number, error = %e, "error processing pull request"),
            }
        }

        Ok(StatusAction::Processed { merged })
    }

    /// Whether `context` is required by branch protection on the PR's base
    async fn is_status_required(&self, pr: &PullRequestDetails, context: &str) -> bool {
        match self
            .coordinator
            .repo()
            .required_status_contexts(&pr.base_ref)
            .await
        {
            Ok(required) => required.iter().any(|name| name == context),
            Err(e) => {
                warn!(pr_number = pr.number, error = %e, "failed to get required status list");
                false
            }
        }
    }

    /// Select the oldest eligible open PR and start its update
    async fn try_update_another(&self) -> Option<UpdateCycleHandle> {
        let prs = match self.coordinator.repo().list_open_pull_requests().await {
            Ok(prs) => prs,
            Err(e) => {
                error!(error = %e, "failed to update another pull request");
                return None;
            }
        };

        let candidates = self.coordinator.filter_updatable(prs).await;
        self.coordinator.select_oldest_and_update(candidates)
    }
}
