use anyhow::Result;
use repo_docs_github::TreeLister;

/// Print matching paths to stdout and the status line to stderr.
pub async fn run(
    lister: &TreeLister,
    repo: &str,
    branch: &str,
    extensions: Option<&[String]>,
) -> Result<()> {
    let listing = lister.list_files(repo, branch, extensions).await;

    for path in &listing.paths {
        println!("{path}");
    }
    eprintln!("{}", listing.message);

    Ok(())
}
