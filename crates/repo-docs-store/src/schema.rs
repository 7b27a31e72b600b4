use rusqlite_migration::{M, Migrations};

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "CREATE TABLE repositories (
            name                 TEXT PRIMARY KEY,
            ingested_files_json  TEXT NOT NULL DEFAULT '[]',
            file_count           INTEGER NOT NULL DEFAULT 0,
            last_updated         INTEGER NOT NULL
        );

        CREATE TABLE documents (
            id              TEXT PRIMARY KEY,
            repo            TEXT NOT NULL,
            branch          TEXT NOT NULL,
            file_path       TEXT NOT NULL,
            text            TEXT NOT NULL,
            metadata_json   TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX idx_documents_repo ON documents(repo);",
    )])
}
