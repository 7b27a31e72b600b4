use serde::Deserialize;

/// Response from GitHub's Git Trees API.
/// `GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1`
#[derive(Debug, Deserialize)]
pub struct TreeResponse {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// A single entry in the tree. Files are `blob`, directories `tree`.
#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == "blob"
    }
}
