use std::sync::Arc;

use crate::document::Document;
use crate::repo::{ConfigError, RepoId};

/// One batch of files to pull from a single repository and branch.
///
/// Paths are kept in the order given and are not deduplicated; a repeated
/// path is fetched once per occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub repo: RepoId,
    pub branch: String,
    pub paths: Vec<String>,
}

impl FetchRequest {
    pub fn new(
        repo: &str,
        branch: impl Into<String>,
        paths: Vec<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            repo: RepoId::parse(repo)?,
            branch: branch.into(),
            paths,
        })
    }
}

/// Why a single fetch attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("file not found")]
    NotFound,

    #[error("API rate limit exceeded or access denied")]
    Forbidden,

    #[error("path is a directory, not a file")]
    NotAFile,

    #[error("unsupported encoding: {}", .0.as_deref().unwrap_or("none"))]
    UnsupportedEncoding(Option<String>),

    #[error("request timed out")]
    Timeout,

    #[error("{}", transport_message(*status, message))]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

fn transport_message(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {code}: {message}"),
        None => format!("transport error: {message}"),
    }
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Forbidden | Self::Timeout | Self::Transport { .. }
        )
    }
}

/// Terminal reason a path ended up in the failure list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// The attempt loop stopped early on an error that retrying cannot fix.
    #[error("{0}")]
    Failed(FetchError),

    #[error("gave up after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: FetchError },
}

impl FailureReason {
    /// The error from the final attempt.
    pub fn kind(&self) -> &FetchError {
        match self {
            Self::Failed(err) => err,
            Self::ExhaustedRetries { last, .. } => last,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub reason: FailureReason,
}

/// Terminal state of one path.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Document),
    Failure(FileFailure),
}

/// Aggregate result of fetching a batch.
///
/// Entries are in completion order, which need not match request order.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub documents: Vec<Document>,
    pub failures: Vec<FileFailure>,
}

impl FetchReport {
    pub fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Success(doc) => self.documents.push(doc),
            FetchOutcome::Failure(failure) => self.failures.push(failure),
        }
    }

    pub fn failed_paths(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.path.clone()).collect()
    }

    /// Split into the plain `(documents, failed_paths)` pair.
    pub fn into_parts(self) -> (Vec<Document>, Vec<String>) {
        let failed = self.failures.into_iter().map(|f| f.path).collect();
        (self.documents, failed)
    }

    pub fn merge(&mut self, other: FetchReport) {
        self.documents.extend(other.documents);
        self.failures.extend(other.failures);
    }
}

impl FromIterator<FetchOutcome> for FetchReport {
    fn from_iter<I: IntoIterator<Item = FetchOutcome>>(iter: I) -> Self {
        let mut report = Self::default();
        for outcome in iter {
            report.record(outcome);
        }
        report
    }
}

/// Fetches a batch of files, settling every path before returning.
///
/// Implementations never fail the batch because of an individual file;
/// per-file problems end up in [`FetchReport::failures`].
#[async_trait::async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch_batch(&self, request: &FetchRequest) -> FetchReport;
}

#[async_trait::async_trait]
impl<T: FileFetcher + ?Sized> FileFetcher for Arc<T> {
    async fn fetch_batch(&self, request: &FetchRequest) -> FetchReport {
        (**self).fetch_batch(request).await
    }
}
