use anyhow::Result;
use repo_docs_store::RepoStore;

pub fn run(store: &RepoStore) -> Result<()> {
    let stats = store.stats()?;

    println!("Repositories: {}", stats.total_repositories);
    println!("Documents:    {}", stats.total_documents);
    println!("Files:        {}", stats.total_files);

    Ok(())
}
