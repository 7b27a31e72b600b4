pub mod document;
pub mod fetch;
pub mod ingest;
pub mod repo;

pub use document::{Document, DocumentId, DocumentMetadata, RemoteFileMeta, assemble};
pub use fetch::{
    FailureReason, FetchError, FetchOutcome, FetchReport, FetchRequest, FileFailure, FileFetcher,
};
pub use ingest::{
    BatchProgress, DEFAULT_BATCH_SIZE, DocumentSink, IngestError, IngestReport, Ingestor,
    RecordError, RepoRecord, RepoRecordStore, SinkError,
};
pub use repo::{ConfigError, RepoId};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
