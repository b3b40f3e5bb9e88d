//! Core types for pr-rebaser

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository a remote service instance is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}

impl RepoConfig {
    /// Parse an `owner/name` slug
    pub fn from_slug(slug: &str, host: Option<String>) -> Option<Self> {
        let (owner, repo) = slug.trim().trim_end_matches('/').split_once('/')?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.trim_end_matches(".git").to_string(),
            host,
        })
    }
}

/// Unique address of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestLocator {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// PR number
    pub number: u64,
    /// Head branch name
    pub head_ref: String,
    /// Head commit id when the locator was built
    pub head_sha: String,
}

impl PullRequestLocator {
    /// Build a locator for a pull request in the given repository
    pub fn new(config: &RepoConfig, pr: &PullRequestDetails) -> Self {
        Self {
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            number: pr.number,
            head_ref: pr.head_ref.clone(),
            head_sha: pr.head_sha.clone(),
        }
    }

    /// Registry key (`owner/repo#number`)
    pub fn locator(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PullRequestLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// PR state (open, closed, merged)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrState {
    /// PR is open
    Open,
    /// PR was closed without merging
    Closed,
    /// PR was merged
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// GitHub's computed mergeable state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MergeableState {
    /// Mergeable and passing
    Clean,
    /// Mergeable with non-passing commit status
    Unstable,
    /// Merge conflicts
    Dirty,
    /// Blocked by branch protection
    Blocked,
    /// Head is out of date
    Behind,
    /// Draft PR
    Draft,
    /// Mergeable with passing status and pre-receive hooks
    HasHooks,
    /// Not yet computed
    #[default]
    Unknown,
}

/// Pull request details needed for updating and merging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestDetails {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// Current state of the PR
    pub state: PrState,
    /// Whether PR is a draft
    pub is_draft: bool,
    /// Whether PR can be merged
    /// - `Some(true)` = mergeable
    /// - `Some(false)` = has conflicts
    /// - `None` = unknown (GitHub still computing)
    pub mergeable: Option<bool>,
    /// Computed mergeable state
    pub mergeable_state: MergeableState,
    /// Head branch name
    pub head_ref: String,
    /// Head commit id
    pub head_sha: String,
    /// Whether the head branch lives in a fork
    pub head_is_fork: bool,
    /// Base branch name
    pub base_ref: String,
    /// Label names
    pub labels: Vec<String>,
    /// When the PR was opened
    pub created_at: DateTime<Utc>,
    /// Web URL for the PR
    pub html_url: String,
}

impl PullRequestDetails {
    /// Mergeability is known to be false (not merely still computing)
    pub fn is_definitively_unmergeable(&self) -> bool {
        self.mergeable == Some(false) && self.mergeable_state != MergeableState::Unknown
    }
}

/// Author or committer identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Name
    pub name: String,
    /// Email
    pub email: String,
    /// Timestamp
    pub date: DateTime<Utc>,
}

/// Snapshot of an existing commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Commit id
    pub sha: String,
    /// Tree id
    pub tree: String,
    /// Parent commit ids
    pub parents: Vec<String>,
    /// Author
    pub author: Signature,
    /// Committer
    pub committer: Signature,
    /// Full message
    pub message: String,
}

/// Commit to be created remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCommit {
    /// Tree id
    pub tree: String,
    /// Parent commit ids
    pub parents: Vec<String>,
    /// Author
    pub author: Signature,
    /// Committer
    pub committer: Signature,
    /// Full message
    pub message: String,
}

/// Result of comparing a base against a head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Comparison {
    /// Commits on head not on base
    pub ahead_by: u64,
    /// Commits on base not on head
    pub behind_by: u64,
}

/// Result of the remote merge primitive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A merge commit was created on the base ref
    Merged {
        /// Merge commit id
        sha: String,
        /// Tree of the merge commit
        tree: String,
    },
    /// Head was already contained in base
    NothingToMerge,
}

/// Merge strategy/method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    /// Squash all commits into one
    #[default]
    Squash,
    /// Create a merge commit
    Merge,
    /// Rebase commits onto base branch
    Rebase,
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Squash => write!(f, "squash"),
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}
