//! Error types for pr-rebaser

use std::fmt;
use thiserror::Error;

/// Step of a remote rebase attempt, used to locate failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseStep {
    /// Reading the base branch tip and its commit
    ReadBase,
    /// Listing the pull request's commits
    ListCommits,
    /// Creating the temporary ref
    CreateTempRef,
    /// Creating the sibling commit and pointing the temporary ref at it
    Surrogate,
    /// Remote three-way merge of the original commit
    Merge,
    /// Creating the single-parent replacement commit
    Linearize,
    /// Moving the temporary ref to the replacement commit
    AdvanceTempRef,
    /// Fast-forward-only check of the temporary ref
    ValidateFastForward,
    /// Re-reading the pull request head
    VerifyHead,
    /// Force-updating the pull request branch
    PublishBranch,
}

impl fmt::Display for RebaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadBase => "read base",
            Self::ListCommits => "list commits",
            Self::CreateTempRef => "create temporary ref",
            Self::Surrogate => "create sibling commit",
            Self::Merge => "merge commit",
            Self::Linearize => "linearize commit",
            Self::AdvanceTempRef => "advance temporary ref",
            Self::ValidateFastForward => "validate fast-forward",
            Self::VerifyHead => "verify head",
            Self::PublishBranch => "publish branch",
        };
        f.write_str(name)
    }
}

/// How a failure should be treated by the update cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network, rate limit or server error
    Transient,
    /// The remote merge could not be resolved automatically
    Conflict,
    /// The branch moved underneath the attempt
    ConcurrentModification,
    /// Anything else (configuration, internal)
    Other,
}

/// Errors that can occur in pr-rebaser
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Remote merge declined automatic resolution
    #[error("merge conflict merging {head} into {base}")]
    MergeConflict {
        /// Ref or sha merged into
        base: String,
        /// Commit being merged
        head: String,
    },

    /// Pull request head changed while the rebase was in progress
    #[error("{branch} moved from {expected} to {actual} during rebase")]
    HeadMoved {
        /// Head branch name
        branch: String,
        /// Sha captured when the attempt started
        expected: String,
        /// Sha found before publishing
        actual: String,
    },

    /// A non-force ref update was not a fast-forward
    #[error("update of {ref_name} to {sha} rejected: {reason}")]
    RefUpdateRejected {
        /// Ref being updated
        ref_name: String,
        /// Target commit
        sha: String,
        /// Message returned by the API
        reason: String,
    },

    /// A rebase attempt failed at a specific step
    #[error("rebase of {locator} failed at {step}: {source}")]
    Rebase {
        /// Pull request locator (`owner/repo#number`)
        locator: String,
        /// Step that failed
        step: RebaseStep,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap this error with the rebase attempt it belongs to
    pub fn at_step(self, locator: &str, step: RebaseStep) -> Self {
        Self::Rebase {
            locator: locator.to_string(),
            step,
            source: Box::new(self),
        }
    }

    /// Classify the failure, looking through rebase wrappers
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::GitHubApi(_) => FailureKind::Transient,
            Self::MergeConflict { .. } => FailureKind::Conflict,
            Self::HeadMoved { .. } | Self::RefUpdateRejected { .. } => {
                FailureKind::ConcurrentModification
            }
            Self::Rebase { source, .. } => source.failure_kind(),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => FailureKind::Other,
        }
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

/// Result type alias for pr-rebaser
pub type Result<T> = std::result::Result<T, Error>;
