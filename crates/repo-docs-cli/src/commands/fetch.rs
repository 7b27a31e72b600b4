use anyhow::Result;
use repo_docs::{Document, FileFetcher, FetchRequest, RepoId};

/// Fetch the given paths and print each document, then each failure.
///
/// Fails only when nothing could be fetched.
pub async fn run(
    fetcher: &dyn FileFetcher,
    repo: &RepoId,
    branch: &str,
    paths: &[String],
) -> Result<()> {
    let request = FetchRequest {
        repo: repo.clone(),
        branch: branch.to_owned(),
        paths: paths.to_vec(),
    };

    let report = fetcher.fetch_batch(&request).await;

    for doc in &report.documents {
        print_document(doc);
    }

    for failure in &report.failures {
        eprintln!("failed: {}: {}", failure.path, failure.reason);
    }

    if report.documents.is_empty() && !report.failures.is_empty() {
        anyhow::bail!("none of the {} files could be fetched", report.failures.len());
    }

    eprintln!(
        "Fetched {} of {} files from {repo}/{branch}",
        report.documents.len(),
        paths.len()
    );

    Ok(())
}

fn print_document(doc: &Document) {
    let meta = &doc.metadata;
    println!("==> {} <==", doc.id);
    println!("url: {}", meta.url);
    if !meta.raw_url.is_empty() {
        println!("raw: {}", meta.raw_url);
    }
    println!("sha: {}  size: {}", meta.sha, meta.size);
    println!();
    println!("{}", doc.text);
    println!();
}
