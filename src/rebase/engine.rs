//! Commit-by-commit history rewriting through remote primitives

use crate::error::{Error, RebaseStep, Result};
use crate::platform::{RemoteRepository, heads_ref};
use crate::rebase::TemporaryRef;
use crate::types::{CommitRecord, MergeOutcome, NewCommit, PullRequestDetails, PullRequestLocator};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a successful rebase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebaseSummary {
    /// Tip of the rewritten chain, now the PR head
    pub new_head: String,
    /// Number of commits replayed
    pub replayed: usize,
}

/// Tip of the chain rewritten so far and its tree
struct ReplayState {
    head_sha: String,
    tree: String,
}

/// Rebases pull requests without a local working copy
pub struct RebaseEngine {
    repo: Arc<dyn RemoteRepository>,
}

impl RebaseEngine {
    /// Create an engine on top of a remote repository
    pub fn new(repo: Arc<dyn RemoteRepository>) -> Self {
        Self { repo }
    }

    /// Rewrite the PR's commits onto the current tip of its base branch
    ///
    /// `pr.head_sha` is the head captured when the attempt began; the real
    /// branch is only moved if it still points there after the replay. The
    /// temporary ref is deleted on every path.
    pub async fn rebase(&self, pr: &PullRequestDetails) -> Result<RebaseSummary> {
        let locator = PullRequestLocator::new(self.repo.config(), pr).locator();

        let base_sha = self
            .repo
            .get_ref(&heads_ref(&pr.base_ref))
            .await
            .map_err(|e| e.at_step(&locator, RebaseStep::ReadBase))?;
        let base_commit = self
            .repo
            .get_commit(&base_sha)
            .await
            .map_err(|e| e.at_step(&locator, RebaseStep::ReadBase))?;

        let commits = self
            .repo
            .list_pull_request_commits(pr.number)
            .await
            .map_err(|e| e.at_step(&locator, RebaseStep::ListCommits))?;
        if commits.is_empty() {
            return Err(Error::Internal("pull request has no commits".to_string())
                .at_step(&locator, RebaseStep::ListCommits));
        }
        // A truncated listing would publish the branch without its newest commits
        if commits.last().map(|c| c.sha.as_str()) != Some(pr.head_sha.as_str()) {
            return Err(Error::Internal(format!(
                "commit listing does not end at head {}",
                pr.head_sha
            ))
            .at_step(&locator, RebaseStep::ListCommits));
        }

        info!(
            %locator,
            base = %pr.base_ref,
            base_sha = %base_sha,
            commits = commits.len(),
            "rebasing pull request"
        );

        let tmp = TemporaryRef::create(Arc::clone(&self.repo), &base_sha)
            .await
            .map_err(|e| e.at_step(&locator, RebaseStep::CreateTempRef))?;

        let start = ReplayState {
            head_sha: base_commit.sha,
            tree: base_commit.tree,
        };
        let result = self
            .replay_and_publish(tmp.name(), pr, &locator, start, &commits)
            .await;

        tmp.delete().await;

        let new_head = result?;
        info!(%locator, new_head = %new_head, "rebased pull request");
        Ok(RebaseSummary {
            new_head,
            replayed: commits.len(),
        })
    }

    async fn replay_and_publish(
        &self,
        tmp_ref: &str,
        pr: &PullRequestDetails,
        locator: &str,
        start: ReplayState,
        commits: &[CommitRecord],
    ) -> Result<String> {
        let mut state = start;
        for commit in commits {
            state = self.cherry_pick(tmp_ref, state, commit, locator).await?;
        }

        // The temporary ref must already be at the final commit
        self.repo
            .update_ref(tmp_ref, &state.head_sha, false)
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::ValidateFastForward))?;

        let head_ref = heads_ref(&pr.head_ref);
        let actual = self
            .repo
            .get_ref(&head_ref)
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::VerifyHead))?;
        if actual != pr.head_sha {
            return Err(Error::HeadMoved {
                branch: pr.head_ref.clone(),
                expected: pr.head_sha.clone(),
                actual,
            }
            .at_step(locator, RebaseStep::VerifyHead));
        }

        self.repo
            .update_ref(&head_ref, &state.head_sha, true)
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::PublishBranch))?;

        Ok(state.head_sha)
    }

    /// Replay one commit on top of `state`
    ///
    /// The sibling commit carries the rewritten tree with the original
    /// parents, so merging the original commit into it applies exactly that
    /// commit's diff. The merge commit is then replaced by a single-parent
    /// commit on the rewritten chain.
    async fn cherry_pick(
        &self,
        tmp_ref: &str,
        state: ReplayState,
        commit: &CommitRecord,
        locator: &str,
    ) -> Result<ReplayState> {
        debug!(%locator, sha = %commit.sha, onto = %state.head_sha, "replaying commit");

        let sibling = NewCommit {
            tree: state.tree.clone(),
            parents: commit.parents.clone(),
            author: commit.author.clone(),
            committer: commit.committer.clone(),
            message: format!("sibling of {}", commit.sha),
        };
        let sibling_sha = self
            .repo
            .create_commit(&sibling)
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::Surrogate))?;
        self.repo
            .update_ref(tmp_ref, &sibling_sha, true)
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::Surrogate))?;

        let outcome = self
            .repo
            .merge_branches(tmp_ref, &commit.sha, &format!("Merge {} into {tmp_ref}", commit.sha))
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::Merge))?;
        let tree = match outcome {
            MergeOutcome::Merged { tree, .. } => tree,
            MergeOutcome::NothingToMerge => state.tree,
        };

        let replacement = NewCommit {
            tree: tree.clone(),
            parents: vec![state.head_sha],
            author: commit.author.clone(),
            committer: commit.committer.clone(),
            message: commit.message.clone(),
        };
        let head_sha = self
            .repo
            .create_commit(&replacement)
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::Linearize))?;
        self.repo
            .update_ref(tmp_ref, &head_sha, true)
            .await
            .map_err(|e| e.at_step(locator, RebaseStep::AdvanceTempRef))?;

        Ok(ReplayState { head_sha, tree })
    }
}
