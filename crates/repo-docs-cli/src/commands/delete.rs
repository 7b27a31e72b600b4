use anyhow::Result;
use repo_docs_store::RepoStore;

pub fn run(store: &RepoStore, repo: &str) -> Result<()> {
    let summary = store.delete_repository(repo)?;

    if !summary.record_deleted && summary.documents_deleted == 0 {
        println!("Nothing stored for {repo}.");
    } else {
        println!(
            "Deleted {repo} ({} documents removed).",
            summary.documents_deleted
        );
    }

    Ok(())
}
