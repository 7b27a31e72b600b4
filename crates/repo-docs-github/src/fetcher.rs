//! Bounded, retrying batch fetch over a [`ContentApi`].
//!
//! Every path in a request becomes one future. The futures are polled
//! together on the caller's task, so a batch runs as cooperative
//! concurrency on a single execution context. A per-call semaphore is the
//! only admission control: a future holds a permit for the duration of one
//! attempt and gives it back while it sleeps between attempts, so at most
//! `concurrency` requests are ever in flight and one file's backoff never
//! stalls its siblings.
//!
//! The call returns once every path is terminal. A file that keeps failing
//! lands in [`FetchReport::failures`]; it never aborts the batch.
//!
//! There is no overall deadline: a call lasts as long as its slowest
//! file's full retry sequence.

use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use repo_docs::{
    ConfigError, FailureReason, FetchError, FetchOutcome, FetchReport, FetchRequest, FileFailure,
    FileFetcher, assemble,
};
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::api::{ContentApi, GitHubContentApi};
use crate::client::{GitHubClient, GitHubSettings};

/// Which failed attempts get another try.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryScope {
    /// Retry every failure, including ones that cannot change such as a
    /// missing file. Costs extra requests for permanent errors.
    #[default]
    Any,
    /// Only retry errors where [`FetchError::is_transient`] holds.
    TransientOnly,
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Maximum requests in flight at once.
    pub concurrency: usize,
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Delay before the second attempt; doubles for each attempt after that.
    pub backoff_base: Duration,
    pub retry_scope: RetryScope,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retries: 3,
            backoff_base: Duration::from_secs(1),
            retry_scope: RetryScope::Any,
        }
    }
}

impl FetcherConfig {
    /// Sleep after failed attempt number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let mut delay = self.backoff_base;
        for _ in 1..attempt {
            if delay.is_zero() || delay == Duration::MAX {
                break;
            }
            delay = delay.saturating_mul(2);
        }
        delay
    }

    fn should_retry(&self, err: &FetchError) -> bool {
        match self.retry_scope {
            RetryScope::Any => true,
            RetryScope::TransientOnly => err.is_transient(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlockingFetchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

pub struct ConcurrentFetcher<A> {
    api: A,
    config: FetcherConfig,
}

/// The fetcher wired to the real GitHub Contents API.
pub type GitHubFetcher = ConcurrentFetcher<GitHubContentApi>;

impl GitHubFetcher {
    /// Build a fetcher whose connection pool is sized to the concurrency limit.
    pub fn github(settings: GitHubSettings, config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let client = GitHubClient::with_pool_limit(settings, config.concurrency.max(1))?;
        Ok(Self::new(GitHubContentApi::new(client), config))
    }
}

impl<A: ContentApi> ConcurrentFetcher<A> {
    pub fn new(api: A, mut config: FetcherConfig) -> Self {
        config.concurrency = config.concurrency.max(1);
        Self { api, config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch `paths` from `repo` at `branch`.
    ///
    /// Fails only when `repo` is not `owner/repo`, and then before any
    /// request is made. Empty `paths` returns an empty report.
    pub async fn fetch(
        &self,
        repo: &str,
        paths: &[String],
        branch: &str,
    ) -> Result<FetchReport, ConfigError> {
        let request = FetchRequest::new(repo, branch, paths.to_vec())?;
        Ok(self.fetch_request(&request).await)
    }

    /// Blocking form of [`fetch`](Self::fetch) for callers without a runtime.
    ///
    /// Runs on a fresh current-thread runtime, so it panics if called from
    /// inside an async context.
    pub fn fetch_blocking(
        &self,
        repo: &str,
        paths: &[String],
        branch: &str,
    ) -> Result<FetchReport, BlockingFetchError> {
        let request = FetchRequest::new(repo, branch, paths.to_vec())?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(runtime.block_on(self.fetch_request(&request)))
    }

    pub async fn fetch_request(&self, request: &FetchRequest) -> FetchReport {
        if request.paths.is_empty() {
            return FetchReport::default();
        }

        let gate = Semaphore::new(self.config.concurrency);

        let outcomes: Vec<FetchOutcome> = request
            .paths
            .iter()
            .map(|path| self.fetch_with_retry(&gate, request, path))
            .collect::<FuturesUnordered<_>>()
            .collect()
            .await;

        let report: FetchReport = outcomes.into_iter().collect();

        info!(
            repo = %request.repo,
            branch = %request.branch,
            loaded = report.documents.len(),
            failed = report.failures.len(),
            "fetch complete"
        );

        report
    }

    async fn fetch_with_retry(
        &self,
        gate: &Semaphore,
        request: &FetchRequest,
        path: &str,
    ) -> FetchOutcome {
        let clean_path = path.trim_matches('/');
        let max_attempts = self.config.retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match gate.acquire().await {
                Ok(_permit) => {
                    self.api
                        .fetch_file(&request.repo, clean_path, &request.branch)
                        .await
                }
                Err(_) => Err(FetchError::Transport {
                    status: None,
                    message: "admission gate closed".into(),
                }),
            };

            let err = match result {
                Ok(file) => {
                    return FetchOutcome::Success(assemble(
                        file.content,
                        clean_path,
                        &request.repo,
                        &request.branch,
                        &file.meta,
                    ));
                }
                Err(err) => err,
            };

            if !self.config.should_retry(&err) {
                error!(path, error = %err, "fetch failed; not retrying");
                return failure(path, FailureReason::Failed(err));
            }

            if attempt >= max_attempts {
                error!(path, attempts = attempt, error = %err, "fetch failed; giving up");
                return failure(
                    path,
                    FailureReason::ExhaustedRetries {
                        attempts: attempt,
                        last: err,
                    },
                );
            }

            let delay = self.config.backoff_for(attempt);
            warn!(path, attempt, error = %err, ?delay, "fetch attempt failed; retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

fn failure(path: &str, reason: FailureReason) -> FetchOutcome {
    FetchOutcome::Failure(FileFailure {
        path: path.to_owned(),
        reason,
    })
}

#[async_trait::async_trait]
impl<A: ContentApi> FileFetcher for ConcurrentFetcher<A> {
    async fn fetch_batch(&self, request: &FetchRequest) -> FetchReport {
        self.fetch_request(request).await
    }
}
