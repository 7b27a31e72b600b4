use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::{
    Document, DocumentSink, FailureReason, FetchError, FetchOutcome, FetchReport, FetchRequest,
    FileFailure, FileFetcher, RecordError, RemoteFileMeta, RepoRecord, RepoRecordStore,
    SinkError, assemble,
};

/// Fetcher that serves a fixed set of files and records every request.
/// Unknown paths fail with `NotFound`.
#[derive(Default)]
pub struct ScriptedFetcher {
    files: HashMap<String, String>,
    strip_repo_tag: bool,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Serve documents whose metadata has an empty `repo`.
    pub fn without_repo_tag(mut self) -> Self {
        self.strip_repo_tag = true;
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl FileFetcher for ScriptedFetcher {
    async fn fetch_batch(&self, request: &FetchRequest) -> FetchReport {
        self.requests.lock().unwrap().push(request.clone());

        request
            .paths
            .iter()
            .map(|path| match self.files.get(path) {
                Some(content) => {
                    let remote = RemoteFileMeta {
                        size: content.len() as u64,
                        ..RemoteFileMeta::default()
                    };
                    let mut doc = assemble(
                        content.as_str(),
                        path,
                        &request.repo,
                        &request.branch,
                        &remote,
                    );
                    if self.strip_repo_tag {
                        doc.metadata.repo.clear();
                    }
                    FetchOutcome::Success(doc)
                }
                None => FetchOutcome::Failure(FileFailure {
                    path: path.clone(),
                    reason: FailureReason::Failed(FetchError::NotFound),
                }),
            })
            .collect()
    }
}

/// Sink that keeps everything it is given.
#[derive(Default)]
pub struct InMemorySink {
    documents: Mutex<Vec<Document>>,
    calls: Mutex<usize>,
    fail_with: Option<String>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every `ingest` call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn documents(&self) -> Vec<Document> {
        self.documents.lock().unwrap().clone()
    }

    pub fn ingest_calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl DocumentSink for InMemorySink {
    async fn ingest(&self, documents: &[Document]) -> Result<(), SinkError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(message) = &self.fail_with {
            return Err(SinkError(message.clone()));
        }
        self.documents.lock().unwrap().extend_from_slice(documents);
        Ok(())
    }
}

/// Record store backed by a map keyed on repository name.
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<BTreeMap<String, RepoRecord>>,
    fail_with: Option<String>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every `upsert` fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl RepoRecordStore for InMemoryRecordStore {
    async fn upsert(&self, record: RepoRecord) -> Result<(), RecordError> {
        if let Some(message) = &self.fail_with {
            return Err(RecordError(message.clone()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(record.name.clone(), record);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<RepoRecord>, RecordError> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, RecordError> {
        Ok(self.records.lock().unwrap().remove(name).is_some())
    }
}
