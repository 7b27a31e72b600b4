use anyhow::Result;
use repo_docs_store::RepoStore;

pub fn run(store: &RepoStore) -> Result<()> {
    let records = store.records()?;

    if records.is_empty() {
        println!("No repositories ingested yet.");
        return Ok(());
    }

    let width = records
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0);

    for record in &records {
        println!(
            "  {:<width$}  {:>5} files  updated {}",
            record.name,
            record.file_count,
            format_timestamp(record.last_updated),
            width = width
        );
    }

    println!("\n{} repositories", records.len());

    Ok(())
}

/// Render epoch seconds as a UTC date and time.
fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| format!("{secs} (unix time)"))
}
