use std::time::Duration;

use repo_docs::RepoId;
use tracing::{debug, warn};

use crate::client::{GitHubClient, InvalidBaseUrl, truncate_body};
use crate::tree::TreeResponse;

/// Why a repository listing came back empty.
///
/// The `Display` text is written for people: it is what gets shown next to
/// an empty file list.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("Invalid GitHub URL format. Use: https://github.com/owner/repo or owner/repo")]
    InvalidRepo(String),

    #[error("Repository '{repo}' not found or branch '{branch}' doesn't exist")]
    NotFound { repo: String, branch: String },

    #[error("GitHub API rate limit exceeded. Consider using a GitHub token.")]
    RateLimited,

    #[error("Access denied. Repository may be private or require authentication.")]
    AccessDenied,

    #[error("GitHub API Error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Request timeout after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    BaseUrl(#[from] InvalidBaseUrl),
}

/// Paths found in a repository plus a status line describing the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub paths: Vec<String>,
    pub message: String,
}

/// Lists files in a repository through the Git Trees API. One request per
/// call, never retried.
#[derive(Debug, Clone)]
pub struct TreeLister {
    client: GitHubClient,
}

impl TreeLister {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }

    /// List files, folding any failure into the returned message.
    ///
    /// `extensions` is matched case-insensitively against the end of each
    /// path; `None` keeps every file.
    pub async fn list_files(
        &self,
        repo_url_or_id: &str,
        branch: &str,
        extensions: Option<&[String]>,
    ) -> Listing {
        let repo = match RepoId::normalize(repo_url_or_id) {
            Some(repo) => repo,
            None => {
                return Listing {
                    paths: Vec::new(),
                    message: ListError::InvalidRepo(repo_url_or_id.to_owned()).to_string(),
                };
            }
        };

        match self.list_tree(&repo, branch, extensions).await {
            Ok(paths) => {
                let filter = extension_label(extensions);
                let message = if paths.is_empty() {
                    format!("No files ({filter}) found in repository {repo}/{branch}")
                } else {
                    format!("Found {} files ({filter}) in {repo}/{branch}", paths.len())
                };
                Listing { paths, message }
            }
            Err(e) => Listing {
                paths: Vec::new(),
                message: e.to_string(),
            },
        }
    }

    /// Markdown and MDX files only.
    pub async fn list_markdown_files(&self, repo_url_or_id: &str, branch: &str) -> Listing {
        let extensions = [".md".to_owned(), ".mdx".to_owned()];
        self.list_files(repo_url_or_id, branch, Some(extensions.as_slice()))
            .await
    }

    /// Like [`list_files`](Self::list_files) but keeps the failure typed.
    pub async fn try_list_files(
        &self,
        repo_url_or_id: &str,
        branch: &str,
        extensions: Option<&[String]>,
    ) -> Result<Vec<String>, ListError> {
        let repo = RepoId::normalize(repo_url_or_id)
            .ok_or_else(|| ListError::InvalidRepo(repo_url_or_id.to_owned()))?;
        self.list_tree(&repo, branch, extensions).await
    }

    async fn list_tree(
        &self,
        repo: &RepoId,
        branch: &str,
        extensions: Option<&[String]>,
    ) -> Result<Vec<String>, ListError> {
        // a branch like `feature/x` stays slash-separated in the path
        let segments = ["repos", repo.owner(), repo.name(), "git", "trees"]
            .into_iter()
            .chain(branch.split('/'));
        let mut url = self.client.endpoint(segments)?;
        url.query_pairs_mut().append_pair("recursive", "1");

        debug!(%url, "listing repository tree");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();

        if status.as_u16() == 404 {
            return Err(ListError::NotFound {
                repo: repo.to_string(),
                branch: branch.to_owned(),
            });
        }

        if status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(if body.to_lowercase().contains("rate limit") {
                ListError::RateLimited
            } else {
                ListError::AccessDenied
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ListError::Api {
                status: status.as_u16(),
                body: truncate_body(&body, 200),
            });
        }

        let tree: TreeResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ListError::Timeout(self.client.timeout())
            } else {
                ListError::InvalidResponse(e.to_string())
            }
        })?;

        if tree.truncated {
            warn!(%repo, branch, "tree response was truncated; results may be incomplete");
        }

        let lowered: Option<Vec<String>> =
            extensions.map(|exts| exts.iter().map(|e| e.to_lowercase()).collect());

        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.is_file())
            .map(|entry| entry.path)
            .filter(|path| match &lowered {
                None => true,
                Some(exts) => {
                    let path = path.to_lowercase();
                    exts.iter().any(|ext| path.ends_with(ext.as_str()))
                }
            })
            .collect())
    }

    fn request_error(&self, e: reqwest::Error) -> ListError {
        if e.is_timeout() {
            ListError::Timeout(self.client.timeout())
        } else {
            ListError::Network(e.to_string())
        }
    }
}

fn extension_label(extensions: Option<&[String]>) -> String {
    match extensions {
        Some(exts) if !exts.is_empty() => exts.join(", "),
        _ => "all files".to_owned(),
    }
}
