use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::github::client::DEFAULT_API_BASE;
use crate::models::RepositoryRef;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub discovery: DiscoveryConfig,
}

/// Where to talk to GitHub and with which credential
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Repository in `owner/name` form
    pub repository: String,
    pub api_base: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repository: "ograu/prsfetcher".to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            token_env: "PRSFETCHER_GITHUB_TOKEN".to_string(),
        }
    }
}

/// Status discovery tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub max_concurrent_status_fetches: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_status_fetches: 8,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from the default location (.pr-deployer/config.yml)
    pub fn load_default() -> Result<Self> {
        Self::load(".pr-deployer/config.yml")
    }

    /// The configured repository
    pub fn repository(&self) -> Result<RepositoryRef> {
        self.github
            .repository
            .parse::<RepositoryRef>()
            .map_err(anyhow::Error::msg)
            .context("Invalid github.repository")
    }

    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        let var = &self.github.token_env;
        let token = std::env::var(var).with_context(|| format!("{} not set", var))?;
        if token.trim().is_empty() {
            anyhow::bail!("{} is empty", var);
        }
        Ok(token)
    }
}
