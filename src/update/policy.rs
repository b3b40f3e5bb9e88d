//! Update eligibility
//!
//! Deciding whether a PR should be kept up to date is delegated to an
//! `UpdatePolicy`. `LabelPolicy` is the built-in implementation.

use crate::error::Result;
use crate::types::PullRequestDetails;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Signals that put a PR on a whitelist or blacklist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalSet {
    /// Label names (matched case-insensitively)
    #[serde(default)]
    pub labels: Vec<String>,
}

impl SignalSet {
    /// Whether this list is in use
    pub fn enabled(&self) -> bool {
        !self.labels.is_empty()
    }
}

/// Update section of the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// PRs matching these are updated
    #[serde(default)]
    pub whitelist: SignalSet,
    /// PRs matching these are never updated
    #[serde(default)]
    pub blacklist: SignalSet,
}

/// Evaluates whitelist/blacklist membership
#[async_trait]
pub trait UpdatePolicy: Send + Sync {
    /// Reason the PR matches the blacklist, if it does
    async fn is_blacklisted(
        &self,
        pr: &PullRequestDetails,
        signals: &SignalSet,
    ) -> Result<Option<String>>;

    /// Reason the PR matches the whitelist, if it does
    async fn is_whitelisted(
        &self,
        pr: &PullRequestDetails,
        signals: &SignalSet,
    ) -> Result<Option<String>>;
}

/// Policy matching PR labels
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelPolicy;

impl LabelPolicy {
    fn matching_label<'a>(pr: &'a PullRequestDetails, signals: &SignalSet) -> Option<&'a str> {
        pr.labels
            .iter()
            .find(|label| signals.labels.iter().any(|s| s.eq_ignore_ascii_case(label)))
            .map(String::as_str)
    }
}

#[async_trait]
impl UpdatePolicy for LabelPolicy {
    async fn is_blacklisted(
        &self,
        pr: &PullRequestDetails,
        signals: &SignalSet,
    ) -> Result<Option<String>> {
        Ok(Self::matching_label(pr, signals)
            .map(|label| format!("the pull request has the blacklist label {label:?}")))
    }

    async fn is_whitelisted(
        &self,
        pr: &PullRequestDetails,
        signals: &SignalSet,
    ) -> Result<Option<String>> {
        Ok(Self::matching_label(pr, signals)
            .map(|label| format!("the pull request has the whitelist label {label:?}")))
    }
}

/// Decide whether a PR should be kept up to date with its base
///
/// Returns `false` without consulting the policy when neither list is
/// enabled.
pub async fn should_update(
    policy: &dyn UpdatePolicy,
    pr: &PullRequestDetails,
    config: &UpdateConfig,
) -> Result<bool> {
    if !config.blacklist.enabled() && !config.whitelist.enabled() {
        return Ok(false);
    }

    if config.blacklist.enabled()
        && let Some(reason) = policy.is_blacklisted(pr, &config.blacklist).await?
    {
        debug!(
            pr_number = pr.number,
            "not updateable because blacklisting is enabled and {reason}"
        );
        return Ok(false);
    }

    if config.whitelist.enabled() {
        let Some(reason) = policy.is_whitelisted(pr, &config.whitelist).await? else {
            debug!(
                pr_number = pr.number,
                "not updateable because whitelisting is enabled and no whitelist signal detected"
            );
            return Ok(false);
        };
        debug!(
            pr_number = pr.number,
            "whitelisted because whitelisting is enabled and {reason}"
        );
    }

    Ok(true)
}
