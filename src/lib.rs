//! pr-rebaser - keeps pull requests rebased onto their base branch
//!
//! Rebases happen entirely through the GitHub API: commits are replayed on a
//! temporary ref with remote merges and the PR branch is force-updated only
//! once the whole chain was rewritten. A process-wide coordinator runs at
//! most one rebase at a time, picks the oldest eligible PR, and backs off
//! from PRs whose rebase keeps failing.

pub mod config;
pub mod error;
pub mod merge;
pub mod platform;
pub mod rebase;
pub mod status;
pub mod types;
pub mod update;
