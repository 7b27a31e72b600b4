use std::sync::Arc;

use repo_docs::{FetchError, RemoteFileMeta, RepoId};
use tracing::{debug, warn};

use crate::client::{GitHubClient, truncate_body};
use crate::content::ContentsBody;

/// Decoded file text plus what the API said about the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    pub meta: RemoteFileMeta,
}

/// A single attempt at reading one file. Retrying is the caller's business.
#[async_trait::async_trait]
pub trait ContentApi: Send + Sync {
    async fn fetch_file(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFile, FetchError>;
}

#[async_trait::async_trait]
impl<T: ContentApi + ?Sized> ContentApi for Arc<T> {
    async fn fetch_file(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFile, FetchError> {
        (**self).fetch_file(repo, path, branch).await
    }
}

/// Reads files through GitHub's Contents API.
#[derive(Debug, Clone)]
pub struct GitHubContentApi {
    client: GitHubClient,
}

impl GitHubContentApi {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

fn request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport {
            status: None,
            message: e.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ContentApi for GitHubContentApi {
    async fn fetch_file(
        &self,
        repo: &RepoId,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFile, FetchError> {
        let segments = ["repos", repo.owner(), repo.name(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self
            .client
            .endpoint(segments)
            .map_err(|e| FetchError::Transport {
                status: None,
                message: e.to_string(),
            })?;
        url.query_pairs_mut().append_pair("ref", branch);

        debug!(%url, "fetching file");

        let response = self.client.get(url).send().await.map_err(request_error)?;
        let status = response.status();

        match status.as_u16() {
            404 => return Err(FetchError::NotFound),
            403 => return Err(FetchError::Forbidden),
            _ => {}
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Transport {
                status: Some(status.as_u16()),
                message: truncate_body(&body, 200),
            });
        }

        let body: ContentsBody = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::InvalidResponse(e.to_string())
            }
        })?;

        let file = match body {
            ContentsBody::Directory(_) => return Err(FetchError::NotAFile),
            ContentsBody::File(file) => file,
        };

        let decoded = file.decode()?;
        if decoded.lossy {
            warn!(%repo, path, "content is not valid UTF-8; decoded as Latin-1");
        }

        Ok(RemoteFile {
            content: decoded.text,
            meta: file.remote_meta(),
        })
    }
}
