pub mod delete;
pub mod fetch;
pub mod ingest;
pub mod list;
pub mod repos;
pub mod stats;

use anyhow::{Context, Result};
use repo_docs::RepoId;

/// Accept `owner/repo` or a GitHub URL.
pub fn parse_repo(input: &str) -> Result<RepoId> {
    RepoId::normalize(input).with_context(|| {
        format!("invalid repository {input:?}; use owner/repo or https://github.com/owner/repo")
    })
}

/// Extension filter for listing: `None` with `--all`, otherwise the flags
/// given on the command line or the configured defaults. A missing leading
/// dot is added.
pub fn extension_filter(all: bool, flags: &[String], configured: &[String]) -> Option<Vec<String>> {
    if all {
        return None;
    }

    let chosen = if flags.is_empty() { configured } else { flags };
    Some(
        chosen
            .iter()
            .map(|ext| {
                if ext.starts_with('.') {
                    ext.clone()
                } else {
                    format!(".{ext}")
                }
            })
            .collect(),
    )
}
