use anyhow::{Context, Result};
use repo_docs::{BatchProgress, FileFetcher, Ingestor, RepoId};
use repo_docs_github::TreeLister;
use repo_docs_store::RepoStore;

pub struct IngestOptions<'a> {
    pub branch: &'a str,
    /// Explicit selection; when empty the repository tree is listed instead.
    pub paths: &'a [String],
    pub extensions: Option<&'a [String]>,
    pub batch_size: usize,
}

pub async fn run(
    lister: &TreeLister,
    fetcher: &dyn FileFetcher,
    store: &RepoStore,
    repo: &RepoId,
    options: IngestOptions<'_>,
) -> Result<()> {
    let branch = options.branch;

    let paths = if options.paths.is_empty() {
        let listed = lister
            .try_list_files(repo.as_str(), branch, options.extensions)
            .await
            .with_context(|| format!("could not list files in {repo}/{branch}"))?;
        eprintln!("Found {} files in {repo}/{branch}", listed.len());
        listed
    } else {
        options.paths.to_vec()
    };

    if paths.is_empty() {
        anyhow::bail!("no matching files in {repo}/{branch}");
    }

    let report = Ingestor::new(fetcher, store, store)
        .with_batch_size(options.batch_size)
        .run(repo.as_str(), branch, &paths, print_progress)
        .await?;

    for path in &report.failed_paths {
        eprintln!("failed: {path}");
    }

    if !report.record_saved && report.documents_loaded > 0 {
        eprintln!("warning: documents were stored but the repository record was not updated");
    }

    println!(
        "Ingested {} of {} files from {repo}/{branch}",
        report.documents_loaded,
        paths.len()
    );

    Ok(())
}

fn print_progress(progress: &BatchProgress) {
    eprintln!(
        "[{}/{}] {}/{} files ({:.0}%), {} loaded, {} failed",
        progress.batch,
        progress.batches,
        progress.processed,
        progress.total,
        progress.fraction() * 100.0,
        progress.loaded,
        progress.failed,
    );
}
