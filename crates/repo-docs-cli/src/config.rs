use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use repo_docs::DEFAULT_BATCH_SIZE;
use repo_docs_github::{FetcherConfig, GitHubSettings, RetryScope};
use serde::Deserialize;
use tracing::warn;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubSection,
    pub fetch: FetchSection,
    pub ingest: IngestSection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub token: Option<String>,
    pub api_base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSection {
    pub concurrency: usize,
    pub retries: u32,
    pub backoff_base_ms: u64,
    pub retry_scope: RetryScope,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retries: 3,
            backoff_base_ms: 1000,
            retry_scope: RetryScope::Any,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub batch_size: usize,
    pub extensions: Vec<String>,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            extensions: vec![".md".into(), ".mdx".into()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
}

impl AppConfig {
    pub fn github_settings(&self) -> GitHubSettings {
        GitHubSettings {
            token: self.github.token.clone(),
            api_base_url: self.github.api_base_url.clone(),
            timeout: Duration::from_secs(self.github.timeout_secs),
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            concurrency: self.fetch.concurrency,
            retries: self.fetch.retries,
            backoff_base: Duration::from_millis(self.fetch.backoff_base_ms),
            retry_scope: self.fetch.retry_scope,
        }
    }

    /// Let `GITHUB_TOKEN`, then `GITHUB_API_KEY`, override the configured token.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let token = ["GITHUB_TOKEN", "GITHUB_API_KEY"]
            .into_iter()
            .filter_map(&lookup)
            .find(|value| !value.trim().is_empty());

        if token.is_some() {
            self.github.token = token;
        }
    }

    /// Database file, creating its parent directory if needed.
    pub fn db_path(&self) -> Result<PathBuf> {
        let path = match &self.store.path {
            Some(path) => path.clone(),
            None => dirs::cache_dir()
                .context("could not determine cache directory")?
                .join("repo-docs")
                .join("repo-docs.db"),
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        Ok(path)
    }
}

/// Config file path: `~/.config/repo-docs/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("repo-docs").join("config.toml"))
}

/// Load config from file, falling back to defaults if missing, then apply
/// environment overrides.
pub fn load_config() -> AppConfig {
    let mut config = read_config_file().unwrap_or_default();
    config.apply_env(|key| std::env::var(key).ok());
    config
}

fn read_config_file() -> Option<AppConfig> {
    let path = config_path()?;
    let contents = std::fs::read_to_string(&path).ok()?;

    match toml::from_str::<AppConfig>(&contents) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config; using defaults");
            None
        }
    }
}
