//! Shared command context for CLI commands

use pr_rebaser::config::Config;
use pr_rebaser::error::{Error, Result};
use pr_rebaser::platform::{GitHubService, RemoteRepository};
use pr_rebaser::types::RepoConfig;
use pr_rebaser::update::{LabelPolicy, UpdateCoordinator, UpdateState};
use std::sync::Arc;

/// Shared context for CLI commands that talk to one repository
///
/// The `UpdateState` is created once per process and handed in, so every
/// coordinator built from it shares the same rebase lock and registries.
pub struct CommandContext {
    /// Loaded configuration
    pub config: Config,
    /// Remote repository service
    pub repo: Arc<dyn RemoteRepository>,
    /// Coordinator bound to the repository
    pub coordinator: UpdateCoordinator,
}

impl CommandContext {
    /// Create a context for `owner/name`
    pub fn new(config: Config, slug: &str, state: Arc<UpdateState>) -> Result<Self> {
        let repo_config = RepoConfig::from_slug(slug, config.github.host.clone())
            .ok_or_else(|| Error::Config(format!("invalid repository {slug:?}, expected owner/name")))?;
        let token = config.token()?;

        let repo: Arc<dyn RemoteRepository> = Arc::new(GitHubService::new(
            &token,
            repo_config.owner,
            repo_config.repo,
            repo_config.host,
        )?);

        let coordinator = UpdateCoordinator::new(
            Arc::clone(&repo),
            Arc::new(LabelPolicy),
            state,
            config.update.lists.clone(),
            config.update.poll_settings(),
        );

        Ok(Self {
            config,
            repo,
            coordinator,
        })
    }
}
