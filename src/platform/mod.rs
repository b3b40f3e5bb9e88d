//! Remote repository service
//!
//! All history rewriting goes through these primitives; nothing here keeps
//! a local object store or working tree.

mod github;

pub use github::GitHubService;

use crate::error::Result;
use crate::types::{
    CommitRecord, Comparison, MergeMethod, MergeOutcome, NewCommit, PullRequestDetails,
    RepoConfig,
};
use async_trait::async_trait;

const REFS_PREFIX: &str = "refs/";
const HEADS_PREFIX: &str = "heads/";

/// Normalize a branch or ref name to the `heads/<branch>` form
///
/// Accepts `refs/heads/x`, `heads/x` and bare `x`.
pub fn heads_ref(name: &str) -> String {
    let name = name.strip_prefix(REFS_PREFIX).unwrap_or(name);
    let name = name.strip_prefix(HEADS_PREFIX).unwrap_or(name);
    format!("{HEADS_PREFIX}{name}")
}

/// Primitives of a hosted repository service, bound to one repository
///
/// Ref names passed in are in `heads/<branch>` form (see [`heads_ref`]).
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Get the repository this service is bound to
    fn config(&self) -> &RepoConfig;

    /// Commit id a ref points at
    async fn get_ref(&self, name: &str) -> Result<String>;

    /// Create a ref pointing at `sha`
    async fn create_ref(&self, name: &str, sha: &str) -> Result<()>;

    /// Delete a ref
    async fn delete_ref(&self, name: &str) -> Result<()>;

    /// Move a ref to `sha`
    ///
    /// Without `force` the update is rejected unless it is a fast-forward.
    async fn update_ref(&self, name: &str, sha: &str, force: bool) -> Result<()>;

    /// Read a commit
    async fn get_commit(&self, sha: &str) -> Result<CommitRecord>;

    /// Create a commit object, returning its id
    async fn create_commit(&self, commit: &NewCommit) -> Result<String>;

    /// Merge `head` into the branch `base`
    ///
    /// Fails with `Error::MergeConflict` when the merge cannot be resolved
    /// automatically.
    async fn merge_branches(&self, base: &str, head: &str, message: &str)
    -> Result<MergeOutcome>;

    /// Compare `base...head`
    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison>;

    /// Get full PR details
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestDetails>;

    /// All commits of a PR, oldest first
    async fn list_pull_request_commits(&self, number: u64) -> Result<Vec<CommitRecord>>;

    /// All open PRs in the repository
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestDetails>>;

    /// Open PRs whose head commit is `sha`
    async fn list_open_pull_requests_for_sha(&self, sha: &str) -> Result<Vec<PullRequestDetails>> {
        let prs = self.list_open_pull_requests().await?;
        Ok(prs.into_iter().filter(|pr| pr.head_sha == sha).collect())
    }

    /// Status contexts required by branch protection on `branch`
    ///
    /// Returns an empty list when the branch is not protected.
    async fn required_status_contexts(&self, branch: &str) -> Result<Vec<String>>;

    /// Merge a PR with the specified method, returning whether it merged
    async fn merge_pull_request(&self, number: u64, method: MergeMethod) -> Result<bool>;
}
