use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use repo_docs::{
    Document, DocumentId, DocumentMetadata, DocumentSink, RecordError, RepoRecord,
    RepoRecordStore, SinkError,
};
use tracing::debug;

use crate::schema;

/// Totals across everything that has been ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoStats {
    pub total_repositories: usize,
    pub total_documents: usize,
    /// Sum of each repository record's file count.
    pub total_files: usize,
}

/// What [`RepoStore::delete_repository`] removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub documents_deleted: usize,
    pub record_deleted: bool,
}

/// SQLite-backed home for ingested documents and per-repository records.
///
/// Serves as both the [`DocumentSink`] and the [`RepoRecordStore`] of an
/// ingestion run.
pub struct RepoStore {
    conn: Mutex<rusqlite::Connection>,
}

impl RepoStore {
    /// Open a store backed by a file on disk, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: rusqlite::Connection) -> Result<Self, StoreError> {
        schema::migrations()
            .to_latest(&mut conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    /// Insert or replace documents by id in a single transaction.
    pub fn save_documents(&self, documents: &[Document]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO documents
                    (id, repo, branch, file_path, text, metadata_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for doc in documents {
                let metadata_json = serde_json::to_string(&doc.metadata)
                    .map_err(|e| StoreError::Encoding(e.to_string()))?;
                stmt.execute(rusqlite::params![
                    doc.id.as_str(),
                    doc.metadata.repo,
                    doc.metadata.branch,
                    doc.metadata.file_path,
                    doc.text,
                    metadata_json,
                ])?;
            }
        }

        tx.commit()?;
        debug!(count = documents.len(), "saved documents");
        Ok(())
    }

    /// Documents stored for `repo`, ordered by id.
    pub fn documents_for(&self, repo: &str) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, text, metadata_json FROM documents WHERE repo = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map([repo], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, text, metadata_json)| {
                let metadata: DocumentMetadata = serde_json::from_str(&metadata_json)
                    .map_err(|e| StoreError::Encoding(format!("document {id}: {e}")))?;
                Ok(Document {
                    id: DocumentId::from_raw(id),
                    text,
                    metadata,
                })
            })
            .collect()
    }

    pub fn save_record(&self, record: &RepoRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let files_json = serde_json::to_string(&record.ingested_files)
            .map_err(|e| StoreError::Encoding(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO repositories
                (name, ingested_files_json, file_count, last_updated)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                record.name,
                files_json,
                record.file_count as i64,
                record.last_updated as i64,
            ],
        )?;

        Ok(())
    }

    /// Every repository record, ordered by name.
    pub fn records(&self) -> Result<Vec<RepoRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, ingested_files_json, file_count, last_updated
             FROM repositories
             ORDER BY name",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, files_json, file_count, last_updated)| {
                let ingested_files: Vec<String> = serde_json::from_str(&files_json)
                    .map_err(|e| StoreError::Encoding(format!("repository {name}: {e}")))?;
                Ok(RepoRecord {
                    name,
                    ingested_files,
                    file_count: file_count.max(0) as usize,
                    last_updated: last_updated.max(0) as u64,
                })
            })
            .collect()
    }

    /// Names of every recorded repository, sorted.
    pub fn repo_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM repositories ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Remove a repository's documents and its record together.
    pub fn delete_repository(&self, name: &str) -> Result<DeleteSummary, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let documents_deleted = tx.execute("DELETE FROM documents WHERE repo = ?1", [name])?;
        let records_deleted = tx.execute("DELETE FROM repositories WHERE name = ?1", [name])?;

        tx.commit()?;

        Ok(DeleteSummary {
            documents_deleted,
            record_deleted: records_deleted > 0,
        })
    }

    pub fn stats(&self) -> Result<RepoStats, StoreError> {
        let conn = self.conn()?;

        let (total_repositories, total_files): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_count), 0) FROM repositories",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total_documents: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        Ok(RepoStats {
            total_repositories: total_repositories.max(0) as usize,
            total_documents: total_documents.max(0) as usize,
            total_files: total_files.max(0) as usize,
        })
    }
}

#[async_trait::async_trait]
impl DocumentSink for RepoStore {
    async fn ingest(&self, documents: &[Document]) -> Result<(), SinkError> {
        self.save_documents(documents)
            .map_err(|e| SinkError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl RepoRecordStore for RepoStore {
    async fn upsert(&self, record: RepoRecord) -> Result<(), RecordError> {
        self.save_record(&record)
            .map_err(|e| RecordError(e.to_string()))
    }

    async fn all(&self) -> Result<Vec<RepoRecord>, RecordError> {
        self.records().map_err(|e| RecordError(e.to_string()))
    }

    async fn delete(&self, name: &str) -> Result<bool, RecordError> {
        self.delete_repository(name)
            .map(|summary| summary.record_deleted)
            .map_err(|e| RecordError(e.to_string()))
    }
}

/// Errors specific to store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("stored data could not be decoded: {0}")]
    Encoding(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
