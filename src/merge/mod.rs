//! Merge hand-off for pull requests whose checks passed
//!
//! Merge policy is an external concern; the status handler only asks a
//! `MergeHandler` to process up-to-date PRs. `LabelMerger` merges PRs that
//! carry one of the configured labels.

use crate::error::Result;
use crate::platform::RemoteRepository;
use crate::types::{MergeMethod, MergeableState, PrState, PullRequestDetails};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Merge section of the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// PRs carrying one of these labels are merged (empty disables merging)
    #[serde(default)]
    pub labels: Vec<String>,
    /// Merge method to use
    #[serde(default)]
    pub method: MergeMethod,
}

/// Processes a PR that is up to date and whose status changed to success
#[async_trait]
pub trait MergeHandler: Send + Sync {
    /// Merge the PR if allowed, returning whether it was merged
    async fn process(&self, pr: &PullRequestDetails) -> Result<bool>;
}

/// Merges labelled PRs through the remote service
pub struct LabelMerger {
    repo: Arc<dyn RemoteRepository>,
    config: MergeConfig,
}

impl LabelMerger {
    /// Create a merger for a repository
    pub fn new(repo: Arc<dyn RemoteRepository>, config: MergeConfig) -> Self {
        Self { repo, config }
    }

    /// Whether the PR is in a state GitHub would accept a merge for
    fn is_ready(pr: &PullRequestDetails) -> bool {
        pr.state == PrState::Open
            && !pr.is_draft
            && pr.mergeable == Some(true)
            && !matches!(
                pr.mergeable_state,
                MergeableState::Blocked
                    | MergeableState::Behind
                    | MergeableState::Dirty
                    | MergeableState::Draft
            )
    }

    fn has_merge_label(&self, pr: &PullRequestDetails) -> bool {
        pr.labels
            .iter()
            .any(|label| self.config.labels.iter().any(|l| l.eq_ignore_ascii_case(label)))
    }
}

#[async_trait]
impl MergeHandler for LabelMerger {
    async fn process(&self, pr: &PullRequestDetails) -> Result<bool> {
        if self.config.labels.is_empty() {
            debug!(pr_number = pr.number, "merging disabled");
            return Ok(false);
        }
        if !self.has_merge_label(pr) {
            debug!(pr_number = pr.number, "no merge label");
            return Ok(false);
        }
        if !Self::is_ready(pr) {
            debug!(pr_number = pr.number, state = ?pr.mergeable_state, "pull request not ready to merge");
            return Ok(false);
        }

        self.repo
            .merge_pull_request(pr.number, self.config.method)
            .await
    }
}
