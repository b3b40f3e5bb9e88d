//! rebaser CLI - keep GitHub pull requests rebased onto their base branch

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::context::CommandContext;
use pr_rebaser::config::{Config, default_config_path, load_config};
use pr_rebaser::update::UpdateState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rebaser")]
#[command(about = "Keep pull requests rebased onto their base branch through the GitHub API")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebase one pull request now
    Rebase {
        /// Repository as owner/name
        #[arg(long)]
        repo: String,
        /// Pull request number
        number: u64,
    },
    /// Update the oldest open pull request that is behind its base
    Sweep {
        /// Repository as owner/name
        #[arg(long)]
        repo: String,
    },
    /// Handle a commit status webhook payload
    Status {
        /// Path to the JSON payload
        #[arg(long)]
        payload: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_config(path: Option<PathBuf>) -> Result<Config> {
    match path.or_else(default_config_path) {
        Some(path) => load_config(&path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = read_config(cli.config)?;
    let state = Arc::new(UpdateState::with_cooldown(config.update.failure_cooldown()));

    match cli.command {
        Commands::Rebase { repo, number } => {
            let ctx = CommandContext::new(config, &repo, state)?;
            cli::rebase::run_rebase(&ctx, number).await?;
        }
        Commands::Sweep { repo } => {
            let ctx = CommandContext::new(config, &repo, state)?;
            cli::sweep::run_sweep(&ctx).await?;
        }
        Commands::Status { payload } => {
            let event = cli::status::read_status_event(&payload)?;
            let slug = format!(
                "{}/{}",
                event.repository.owner.login, event.repository.name
            );
            let ctx = CommandContext::new(config, &slug, state)?;
            cli::status::run_status(&ctx, &event).await?;
        }
    }

    Ok(())
}
