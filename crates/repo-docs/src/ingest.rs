use std::collections::HashSet;

use tracing::{info, warn};

use crate::document::Document;
use crate::fetch::{FetchReport, FetchRequest, FileFetcher};
use crate::repo::{ConfigError, RepoId};

/// Files fetched per call to the fetcher.
pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, thiserror::Error)]
#[error("document sink error: {0}")]
pub struct SinkError(pub String);

#[derive(Debug, thiserror::Error)]
#[error("record store error: {0}")]
pub struct RecordError(pub String);

/// Receives fetched documents for indexing.
#[async_trait::async_trait]
pub trait DocumentSink: Send + Sync {
    async fn ingest(&self, documents: &[Document]) -> Result<(), SinkError>;
}

/// What has been ingested for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRecord {
    pub name: String,
    pub ingested_files: Vec<String>,
    pub file_count: usize,
    /// Seconds since the Unix epoch.
    pub last_updated: u64,
}

/// Keeps one [`RepoRecord`] per repository name.
#[async_trait::async_trait]
pub trait RepoRecordStore: Send + Sync {
    /// Insert the record, replacing any existing one with the same name.
    async fn upsert(&self, record: RepoRecord) -> Result<(), RecordError>;

    async fn all(&self) -> Result<Vec<RepoRecord>, RecordError>;

    /// Returns whether a record was removed.
    async fn delete(&self, name: &str) -> Result<bool, RecordError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Progress after a batch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based index of the batch that just finished.
    pub batch: usize,
    pub batches: usize,
    pub processed: usize,
    pub total: usize,
    pub loaded: usize,
    pub failed: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f64 / self.total as f64
    }
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents_loaded: usize,
    pub failed_paths: Vec<String>,
    /// Unique file paths handed to the sink, in first-seen order.
    pub ingested_files: Vec<String>,
    pub record_saved: bool,
}

/// Drives the fetcher over a large selection in fixed-size batches, then
/// hands everything that loaded to the sink and records the result.
pub struct Ingestor<'a> {
    fetcher: &'a dyn FileFetcher,
    sink: &'a dyn DocumentSink,
    records: &'a dyn RepoRecordStore,
    batch_size: usize,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        fetcher: &'a dyn FileFetcher,
        sink: &'a dyn DocumentSink,
        records: &'a dyn RepoRecordStore,
    ) -> Self {
        Self {
            fetcher,
            sink,
            records,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Batch size is independent of the fetcher's concurrency limit. Zero is
    /// treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn run(
        &self,
        repo: &str,
        branch: &str,
        paths: &[String],
        mut on_progress: impl FnMut(&BatchProgress) + Send,
    ) -> Result<IngestReport, IngestError> {
        let repo = RepoId::parse(repo)?;
        let total = paths.len();
        let batches = total.div_ceil(self.batch_size);

        let mut fetched = FetchReport::default();
        let mut processed = 0;

        for (index, chunk) in paths.chunks(self.batch_size).enumerate() {
            let request = FetchRequest {
                repo: repo.clone(),
                branch: branch.to_owned(),
                paths: chunk.to_vec(),
            };

            let report = self.fetcher.fetch_batch(&request).await;
            processed += chunk.len();

            info!(
                repo = %repo,
                batch = index + 1,
                batches,
                loaded = report.documents.len(),
                failed = report.failures.len(),
                "batch complete"
            );

            fetched.merge(report);

            on_progress(&BatchProgress {
                batch: index + 1,
                batches,
                processed,
                total,
                loaded: fetched.documents.len(),
                failed: fetched.failures.len(),
            });
        }

        let FetchReport {
            mut documents,
            failures,
        } = fetched;
        let failed_paths: Vec<String> = failures.into_iter().map(|f| f.path).collect();

        for doc in &mut documents {
            if doc.metadata.repo.is_empty() {
                doc.metadata.repo = repo.to_string();
            }
        }

        if documents.is_empty() {
            warn!(repo = %repo, failed = failed_paths.len(), "no documents loaded; nothing to ingest");
            return Ok(IngestReport {
                failed_paths,
                ..IngestReport::default()
            });
        }

        self.sink.ingest(&documents).await?;

        let ingested_files = unique_file_paths(&documents);
        let record = RepoRecord {
            name: repo.to_string(),
            file_count: ingested_files.len(),
            ingested_files: ingested_files.clone(),
            last_updated: now_epoch_secs(),
        };

        let record_saved = match self.records.upsert(record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(repo = %repo, error = %e, "failed to store repository record");
                false
            }
        };

        info!(
            repo = %repo,
            loaded = documents.len(),
            failed = failed_paths.len(),
            "ingestion complete"
        );

        Ok(IngestReport {
            documents_loaded: documents.len(),
            failed_paths,
            ingested_files,
            record_saved,
        })
    }
}

fn unique_file_paths(documents: &[Document]) -> Vec<String> {
    let mut seen = HashSet::new();
    documents
        .iter()
        .map(|doc| {
            if doc.metadata.file_path.is_empty() {
                doc.id.as_str()
            } else {
                doc.metadata.file_path.as_str()
            }
        })
        .filter(|path| seen.insert(*path))
        .map(str::to_owned)
        .collect()
}

fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{InMemoryRecordStore, InMemorySink, ScriptedFetcher};

    fn paths(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("docs/{i}.md")).collect()
    }

    fn fetcher_with(paths: &[String]) -> ScriptedFetcher {
        paths
            .iter()
            .fold(ScriptedFetcher::new(), |f, p| f.with_file(p, "content"))
    }

    #[tokio::test]
    async fn splits_selection_into_batches() {
        let selected = paths(25);
        let fetcher = fetcher_with(&selected);
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        let mut progress = Vec::new();
        let report = Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &selected, |p| progress.push(*p))
            .await
            .unwrap();

        let sizes: Vec<usize> = fetcher.requests().iter().map(|r| r.paths.len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);

        let fractions: Vec<f64> = progress.iter().map(BatchProgress::fraction).collect();
        assert_eq!(fractions, vec![0.4, 0.8, 1.0]);
        assert_eq!(progress.last().unwrap().batches, 3);

        assert_eq!(report.documents_loaded, 25);
        assert!(report.failed_paths.is_empty());
        assert_eq!(sink.documents().len(), 25);
    }

    #[tokio::test]
    async fn custom_batch_size() {
        let selected = paths(7);
        let fetcher = fetcher_with(&selected);
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        Ingestor::new(&fetcher, &sink, &records)
            .with_batch_size(3)
            .run("o/r", "main", &selected, |_| {})
            .await
            .unwrap();

        let sizes: Vec<usize> = fetcher.requests().iter().map(|r| r.paths.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn accumulates_failures_across_batches() {
        let selected = paths(12);
        // Only even-numbered files exist.
        let fetcher = selected
            .iter()
            .step_by(2)
            .fold(ScriptedFetcher::new(), |f, p| f.with_file(p, "content"));
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        let mut last = None;
        let report = Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &selected, |p| last = Some(*p))
            .await
            .unwrap();

        assert_eq!(report.documents_loaded, 6);
        assert_eq!(report.failed_paths.len(), 6);
        assert!(report.failed_paths.contains(&"docs/1.md".to_owned()));

        let last = last.unwrap();
        assert_eq!(last.loaded, 6);
        assert_eq!(last.failed, 6);
        assert_eq!(last.processed, 12);
    }

    #[tokio::test]
    async fn stores_repo_record_with_unique_paths() {
        let selected = vec![
            "README.md".to_owned(),
            "docs/a.md".to_owned(),
            "README.md".to_owned(),
        ];
        let fetcher = fetcher_with(&selected);
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        let report = Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &selected, |_| {})
            .await
            .unwrap();

        assert!(report.record_saved);
        assert_eq!(report.documents_loaded, 3);
        assert_eq!(report.ingested_files, vec!["README.md", "docs/a.md"]);

        let stored = records.all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "o/r");
        assert_eq!(stored[0].file_count, 2);
        assert!(stored[0].last_updated > 0);
    }

    #[tokio::test]
    async fn invalid_repo_fails_before_fetching() {
        let fetcher = ScriptedFetcher::new();
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        let result = Ingestor::new(&fetcher, &sink, &records)
            .run("nope", "main", &paths(3), |_| {})
            .await;

        assert!(matches!(result, Err(IngestError::Config(_))));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn nothing_loaded_skips_sink_and_record() {
        let selected = paths(3);
        let fetcher = ScriptedFetcher::new();
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        let report = Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &selected, |_| {})
            .await
            .unwrap();

        assert_eq!(report.documents_loaded, 0);
        assert_eq!(report.failed_paths.len(), 3);
        assert!(!report.record_saved);
        assert_eq!(sink.ingest_calls(), 0);
        assert!(records.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tags_documents_missing_repo() {
        let selected = paths(2);
        let fetcher = fetcher_with(&selected).without_repo_tag();
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &selected, |_| {})
            .await
            .unwrap();

        assert!(sink.documents().iter().all(|d| d.metadata.repo == "o/r"));
    }

    #[tokio::test]
    async fn record_failure_is_not_fatal() {
        let selected = paths(2);
        let fetcher = fetcher_with(&selected);
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::failing("disk full");

        let report = Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &selected, |_| {})
            .await
            .unwrap();

        assert_eq!(report.documents_loaded, 2);
        assert!(!report.record_saved);
        assert_eq!(sink.documents().len(), 2);
    }

    #[tokio::test]
    async fn sink_failure_propagates() {
        let selected = paths(2);
        let fetcher = fetcher_with(&selected);
        let sink = InMemorySink::failing("index unavailable");
        let records = InMemoryRecordStore::new();

        let result = Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &selected, |_| {})
            .await;

        assert!(matches!(result, Err(IngestError::Sink(_))));
        assert!(records.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_selection_reports_nothing() {
        let fetcher = ScriptedFetcher::new();
        let sink = InMemorySink::new();
        let records = InMemoryRecordStore::new();

        let mut calls = 0;
        let report = Ingestor::new(&fetcher, &sink, &records)
            .run("o/r", "main", &[], |_| calls += 1)
            .await
            .unwrap();

        assert_eq!(calls, 0);
        assert_eq!(report, IngestReport::default());
        assert!(fetcher.requests().is_empty());
    }
}
