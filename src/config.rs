//! Configuration loaded from `config.toml`

use crate::error::{Error, Result};
use crate::merge::MergeConfig;
use crate::update::{
    DEFAULT_FAILURE_COOLDOWN_MINUTES, DEFAULT_MAX_POLL_TICKS, DEFAULT_POLL_INTERVAL,
    PollSettings, UpdateConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the user config directory
const CONFIG_DIR: &str = "pr-rebaser";

/// Filename for configuration
const CONFIG_FILE: &str = "config.toml";

/// Default environment variable holding the API token
const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// GitHub connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubSettings {
    /// GitHub Enterprise host (None for github.com)
    #[serde(default)]
    pub host: Option<String>,
    /// Environment variable the token is read from
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            host: None,
            token_env: default_token_env(),
        }
    }
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

/// Update section: eligibility and poll timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettings {
    /// Seconds between update-cycle ticks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Ticks per update cycle
    #[serde(default = "default_max_poll_ticks")]
    pub max_poll_ticks: u32,
    /// Minutes to wait after a failed rebase
    #[serde(default = "default_failure_cooldown_minutes")]
    pub failure_cooldown_minutes: i64,
    /// Whitelist / blacklist
    #[serde(flatten)]
    pub lists: UpdateConfig,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_ticks: default_max_poll_ticks(),
            failure_cooldown_minutes: default_failure_cooldown_minutes(),
            lists: UpdateConfig::default(),
        }
    }
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

const fn default_max_poll_ticks() -> u32 {
    DEFAULT_MAX_POLL_TICKS
}

const fn default_failure_cooldown_minutes() -> i64 {
    DEFAULT_FAILURE_COOLDOWN_MINUTES
}

impl UpdateSettings {
    /// Poll timing for update cycles
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_ticks: self.max_poll_ticks,
        }
    }

    /// Failure cooldown window
    ///
    /// Values beyond what a duration can hold saturate.
    pub fn failure_cooldown(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.failure_cooldown_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// GitHub connection
    #[serde(default)]
    pub github: GitHubSettings,
    /// Update behaviour
    #[serde(default)]
    pub update: UpdateSettings,
    /// Merge behaviour
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.update.max_poll_ticks == 0 {
            return Err(Error::Config("update.max_poll_ticks must be at least 1".to_string()));
        }
        if self.update.failure_cooldown_minutes < 0 {
            return Err(Error::Config(
                "update.failure_cooldown_minutes must not be negative".to_string(),
            ));
        }
        if chrono::Duration::try_minutes(self.update.failure_cooldown_minutes).is_none() {
            return Err(Error::Config(
                "update.failure_cooldown_minutes is out of range".to_string(),
            ));
        }
        Ok(())
    }

    /// Read the API token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.github.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} environment variable is required",
                    self.github.token_env
                ))
            })
    }
}

/// Default path of the configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load configuration from disk.
///
/// Returns the default configuration if the file doesn't exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    Config::from_toml(&content)
}
