mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repo_docs_github::{GitHubClient, GitHubFetcher, TreeLister};
use repo_docs_store::RepoStore;
use tracing_subscriber::EnvFilter;

use crate::commands::ingest::IngestOptions;
use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "repo-docs")]
#[command(about = "Fetch documentation files from GitHub repositories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List files in a repository
    List {
        /// Repository as owner/repo or a GitHub URL
        repo: String,
        #[arg(long, default_value = "main")]
        branch: String,
        /// Only keep files ending in this extension (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
        /// List every file, ignoring extension filters
        #[arg(long, conflicts_with = "extensions")]
        all: bool,
    },
    /// Fetch files and print their contents
    Fetch {
        /// Repository as owner/repo or a GitHub URL
        repo: String,
        /// File paths within the repository
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(long, default_value = "main")]
        branch: String,
    },
    /// Fetch files and store them locally
    Ingest {
        /// Repository as owner/repo or a GitHub URL
        repo: String,
        /// File paths; lists the repository when omitted
        paths: Vec<String>,
        #[arg(long, default_value = "main")]
        branch: String,
        /// Only ingest files ending in this extension (repeatable)
        #[arg(long = "ext")]
        extensions: Vec<String>,
        /// Ingest every file, ignoring extension filters
        #[arg(long, conflicts_with = "extensions")]
        all: bool,
        /// Files fetched per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// List ingested repositories
    Repos,
    /// Show totals for everything ingested
    Stats,
    /// Remove a repository's documents and record
    Delete {
        /// Repository as owner/repo or a GitHub URL
        repo: String,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_client(config: &AppConfig) -> Result<GitHubClient> {
    GitHubClient::new(config.github_settings()).context("failed to build HTTP client")
}

fn build_fetcher(config: &AppConfig) -> Result<GitHubFetcher> {
    GitHubFetcher::github(config.github_settings(), config.fetcher_config())
        .context("failed to build HTTP client")
}

fn build_store(config: &AppConfig) -> Result<RepoStore> {
    let path = config.db_path()?;
    RepoStore::open(&path).with_context(|| format!("failed to open store at {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = config::load_config();

    match cli.command {
        Command::List {
            repo,
            branch,
            extensions,
            all,
        } => {
            let lister = TreeLister::new(build_client(&config)?);
            let filter = commands::extension_filter(all, &extensions, &config.ingest.extensions);
            commands::list::run(&lister, &repo, &branch, filter.as_deref()).await
        }
        Command::Fetch {
            repo,
            paths,
            branch,
        } => {
            let repo = commands::parse_repo(&repo)?;
            let fetcher = build_fetcher(&config)?;
            commands::fetch::run(&fetcher, &repo, &branch, &paths).await
        }
        Command::Ingest {
            repo,
            paths,
            branch,
            extensions,
            all,
            batch_size,
        } => {
            let repo = commands::parse_repo(&repo)?;
            let lister = TreeLister::new(build_client(&config)?);
            let fetcher = build_fetcher(&config)?;
            let store = build_store(&config)?;
            let filter = commands::extension_filter(all, &extensions, &config.ingest.extensions);

            commands::ingest::run(
                &lister,
                &fetcher,
                &store,
                &repo,
                IngestOptions {
                    branch: &branch,
                    paths: &paths,
                    extensions: filter.as_deref(),
                    batch_size: batch_size.unwrap_or(config.ingest.batch_size),
                },
            )
            .await
        }
        Command::Repos => commands::repos::run(&build_store(&config)?),
        Command::Stats => commands::stats::run(&build_store(&config)?),
        Command::Delete { repo } => {
            let repo = commands::parse_repo(&repo)?;
            commands::delete::run(&build_store(&config)?, repo.as_str())
        }
    }
}
