use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pr_deployer::{
    Config, DeploymentLedger, GitHubClient, Provider, RepositoryRef, StatusGate,
};

#[derive(Parser)]
#[command(name = "pr-deployer")]
#[command(about = "Track per-PR deployment state in a GitHub ledger comment")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(long, default_value = ".pr-deployer/config.yml")]
    config: PathBuf,

    /// Repository (owner/repo), overrides the config file
    #[arg(long, env = "PR_DEPLOYER_REPO")]
    repo: Option<RepositoryRef>,
}

#[derive(Subcommand)]
enum Commands {
    /// List open PRs whose latest status check passed
    Discover,

    /// Record a provider's status or deployment URL on a PR's ledger
    Update {
        /// PR number
        #[arg(long)]
        pr: u64,

        /// Provider (aws, azure, kvm)
        #[arg(long)]
        provider: Provider,

        /// Status text or deployment URL
        #[arg(long)]
        value: String,
    },

    /// Show a PR's ledger
    Show {
        /// PR number
        #[arg(long)]
        pr: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pr_deployer=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let repo = match cli.repo {
        Some(repo) => repo,
        None => config.repository()?,
    };
    let token = config.token()?;
    let client = Arc::new(
        GitHubClient::with_base_uri(&token, &config.github.api_base)
            .context("Failed to create GitHub client")?,
    );

    match cli.command {
        Commands::Discover => {
            let gate = StatusGate::new(client, config.discovery.max_concurrent_status_fetches);
            discover(&gate, &repo).await?;
        }
        Commands::Update {
            pr,
            provider,
            value,
        } => {
            let ledger = DeploymentLedger::new(client, repo);
            update(&ledger, pr, provider, &value).await?;
        }
        Commands::Show { pr } => {
            let ledger = DeploymentLedger::new(client, repo);
            show(&ledger, pr).await?;
        }
    }

    Ok(())
}

async fn discover(gate: &StatusGate<GitHubClient>, repo: &RepositoryRef) -> Result<()> {
    let records = gate
        .discover_deployable(repo)
        .await
        .with_context(|| format!("Failed to discover deployable PRs in {}", repo))?;

    if records.is_empty() {
        println!("No deployable pull requests in {}.", repo);
        return Ok(());
    }

    for record in records {
        let sha = if record.head_commit_sha.is_empty() {
            "(merge commit pending)"
        } else {
            record.head_commit_sha.as_str()
        };
        println!("#{} {}", record.number, sha);
    }

    Ok(())
}

async fn update(
    ledger: &DeploymentLedger<GitHubClient>,
    pr: u64,
    provider: Provider,
    value: &str,
) -> Result<()> {
    let comment = ledger
        .ensure_and_update(pr, provider, value)
        .await
        .with_context(|| format!("Failed to update ledger for PR #{}", pr))?;

    info!(comment_id = comment.id, %provider, "Ledger updated");
    println!("Updated ledger comment (ID: {})", comment.id);

    Ok(())
}

async fn show(ledger: &DeploymentLedger<GitHubClient>, pr: u64) -> Result<()> {
    let Some(snapshot) = ledger
        .read(pr)
        .await
        .with_context(|| format!("Failed to read ledger for PR #{}", pr))?
    else {
        println!("PR #{} has no deployment ledger yet.", pr);
        return Ok(());
    };

    println!("Deployment ledger for PR #{} in {}:\n", pr, ledger.repository());
    for (provider, value) in &snapshot.entries {
        println!(
            "  {:<6} {}",
            format!("{}:", provider),
            value.as_deref().unwrap_or(pr_deployer::ledger::NOT_INITIALIZED)
        );
    }

    Ok(())
}
