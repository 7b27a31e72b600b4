use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::repo::RepoId;

/// Stable identifier for a fetched file: `{repo}:{branch}:{path}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(repo: &RepoId, branch: &str, path: &str) -> Self {
        Self(format!("{repo}:{branch}:{path}"))
    }

    /// Wrap an identifier that was already composed, e.g. one read back from storage.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File details reported by the contents API next to the file body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileMeta {
    pub sha: String,
    pub size: u64,
    pub download_url: Option<String>,
    pub entry_type: String,
}

impl Default for RemoteFileMeta {
    fn default() -> Self {
        Self {
            sha: String::new(),
            size: 0,
            download_url: None,
            entry_type: "file".into(),
        }
    }
}

/// Metadata attached to every document.
///
/// The serialized field names are what document sinks index on, so they
/// must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub file_path: String,
    pub file_name: String,
    pub file_extension: String,
    pub directory: String,
    pub repo: String,
    pub branch: String,
    pub sha: String,
    pub size: u64,
    pub url: String,
    pub raw_url: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

/// One fetched file, ready for ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// The metadata as a flat JSON object, keyed the way sinks expect.
    pub fn metadata_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(&self.metadata) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// Build a [`Document`] from decoded file content. Pure; does no I/O.
pub fn assemble(
    content: impl Into<String>,
    path: &str,
    repo: &RepoId,
    branch: &str,
    remote: &RemoteFileMeta,
) -> Document {
    let (directory, file_name) = match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    };

    let file_extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default();

    let metadata = DocumentMetadata {
        file_path: path.to_owned(),
        file_name: file_name.to_owned(),
        file_extension,
        directory: directory.to_owned(),
        repo: repo.to_string(),
        branch: branch.to_owned(),
        sha: remote.sha.clone(),
        size: remote.size,
        url: format!("https://github.com/{repo}/blob/{branch}/{path}"),
        raw_url: remote.download_url.clone().unwrap_or_default(),
        entry_type: remote.entry_type.clone(),
    };

    Document {
        id: DocumentId::new(repo, branch, path),
        text: content.into(),
        metadata,
    }
}
