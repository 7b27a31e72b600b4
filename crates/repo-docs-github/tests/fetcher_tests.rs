use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use repo_docs::{FailureReason, FetchError, FileFetcher, FetchRequest, RemoteFileMeta, RepoId};
use repo_docs_github::{ConcurrentFetcher, ContentApi, FetcherConfig, RemoteFile, RetryScope};
use tokio::time::Instant;

/// In-process stand-in for the Contents API that records every attempt.
#[derive(Default)]
struct FakeApi {
    latency: Duration,
    /// Path -> number of attempts that fail with a timeout before succeeding.
    flaky: Mutex<HashMap<String, u32>>,
    /// Paths that fail with the given error on every attempt.
    broken: HashMap<String, FetchError>,
    calls: Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeApi {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn flaky(self, path: &str, failures: u32) -> Self {
        self.flaky.lock().unwrap().insert(path.to_owned(), failures);
        self
    }

    fn broken(mut self, path: &str, err: FetchError) -> Self {
        self.broken.insert(path.to_owned(), err);
        self
    }

    fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, path: &str) -> Vec<Instant> {
        self.calls()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, at)| at)
            .collect()
    }
}

#[async_trait::async_trait]
impl ContentApi for FakeApi {
    async fn fetch_file(
        &self,
        _repo: &RepoId,
        path: &str,
        _branch: &str,
    ) -> Result<RemoteFile, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_owned(), Instant::now()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.broken.get(path) {
            return Err(err.clone());
        }

        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(path) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::Timeout);
                }
            }
        }

        Ok(RemoteFile {
            content: format!("content of {path}"),
            meta: RemoteFileMeta::default(),
        })
    }
}

fn config(concurrency: usize, retries: u32) -> FetcherConfig {
    FetcherConfig {
        concurrency,
        retries,
        backoff_base: Duration::from_secs(1),
        retry_scope: RetryScope::Any,
    }
}

fn paths(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn in_flight_requests_never_exceed_limit() {
    let api = Arc::new(FakeApi::with_latency(Duration::from_millis(50)));
    let fetcher = ConcurrentFetcher::new(api.clone(), config(3, 0));

    let many: Vec<String> = (0..20).map(|i| format!("docs/{i}.md")).collect();
    let started = Instant::now();
    let report = fetcher.fetch("o/r", &many, "main").await.unwrap();

    assert_eq!(report.documents.len(), 20);
    assert_eq!(api.peak.load(Ordering::SeqCst), 3);
    // 20 files, three at a time, 50ms each: at least seven rounds
    assert!(started.elapsed() >= Duration::from_millis(350));
}

#[tokio::test(start_paused = true)]
async fn recovers_when_failures_fit_in_retry_budget() {
    let api = Arc::new(FakeApi::default().flaky("a.md", 3));
    let fetcher = ConcurrentFetcher::new(api.clone(), config(2, 3));

    let report = fetcher.fetch("o/r", &paths(&["a.md"]), "main").await.unwrap();

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].text, "content of a.md");
    assert!(report.failures.is_empty());
    assert_eq!(api.calls_for("a.md").len(), 4);
}

#[tokio::test(start_paused = true)]
async fn persistent_failure_is_reported_not_raised() {
    let api = Arc::new(FakeApi::default().broken("bad.md", FetchError::Timeout));
    let fetcher = ConcurrentFetcher::new(api.clone(), config(2, 2));

    let report = fetcher
        .fetch("o/r", &paths(&["good.md", "bad.md"]), "main")
        .await
        .unwrap();

    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].metadata.file_path, "good.md");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "bad.md");
    assert_eq!(
        report.failures[0].reason,
        FailureReason::ExhaustedRetries {
            attempts: 3,
            last: FetchError::Timeout,
        }
    );
    assert_eq!(api.calls_for("bad.md").len(), 3);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts() {
    let api = Arc::new(FakeApi::default().flaky("a.md", 3));
    let fetcher = ConcurrentFetcher::new(api.clone(), config(1, 3));

    fetcher.fetch("o/r", &paths(&["a.md"]), "main").await.unwrap();

    let times = api.calls_for("a.md");
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(gaps.len(), 3);
    for (gap, secs) in gaps.iter().zip([1, 2, 4]) {
        let expected = Duration::from_secs(secs);
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(10),
            "gaps were {gaps:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn backing_off_file_does_not_block_siblings() {
    let api = Arc::new(FakeApi::default().flaky("a.md", 3));
    let fetcher = ConcurrentFetcher::new(api.clone(), config(1, 3));

    let report = fetcher
        .fetch("o/r", &paths(&["a.md", "b.md"]), "main")
        .await
        .unwrap();

    assert_eq!(report.documents.len(), 2);

    let order: Vec<String> = api.calls().into_iter().map(|(p, _)| p).collect();
    let b_at = order.iter().position(|p| p == "b.md").unwrap();
    let second_a_at = order
        .iter()
        .enumerate()
        .filter(|(_, p)| *p == "a.md")
        .map(|(i, _)| i)
        .nth(1)
        .unwrap();
    assert!(b_at < second_a_at, "call order was {order:?}");

    // b finished while a was still retrying
    assert_eq!(report.documents[0].metadata.file_path, "b.md");
}

#[tokio::test(start_paused = true)]
async fn duplicate_paths_are_fetched_per_occurrence() {
    let api = Arc::new(FakeApi::default());
    let fetcher = ConcurrentFetcher::new(api.clone(), config(4, 0));

    let report = fetcher
        .fetch("o/r", &paths(&["a.md", "a.md"]), "main")
        .await
        .unwrap();

    assert_eq!(report.documents.len(), 2);
    assert_eq!(api.calls_for("a.md").len(), 2);
}

#[tokio::test(start_paused = true)]
async fn transient_only_stops_on_permanent_error() {
    let api = Arc::new(FakeApi::default().broken("gone.md", FetchError::NotFound));
    let fetcher = ConcurrentFetcher::new(
        api.clone(),
        FetcherConfig {
            retry_scope: RetryScope::TransientOnly,
            ..config(2, 3)
        },
    );

    let report = fetcher.fetch("o/r", &paths(&["gone.md"]), "main").await.unwrap();

    assert_eq!(
        report.failures[0].reason,
        FailureReason::Failed(FetchError::NotFound)
    );
    assert_eq!(api.calls_for("gone.md").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn surrounding_slashes_are_trimmed_for_requests_only() {
    let api = Arc::new(FakeApi::default().broken("missing.md", FetchError::NotFound));
    let fetcher = ConcurrentFetcher::new(api.clone(), config(2, 0));

    let report = fetcher
        .fetch("o/r", &paths(&["/docs/a.md/", "/missing.md"]), "main")
        .await
        .unwrap();

    assert_eq!(report.documents.len(), 1);
    let doc = &report.documents[0];
    assert_eq!(doc.id.as_str(), "o/r:main:docs/a.md");
    assert_eq!(doc.metadata.file_path, "docs/a.md");
    assert_eq!(api.calls_for("docs/a.md").len(), 1);

    assert_eq!(report.failures[0].path, "/missing.md");
}

#[tokio::test(start_paused = true)]
async fn works_through_file_fetcher_trait() {
    let api = Arc::new(FakeApi::default());
    let fetcher: Arc<dyn FileFetcher> = Arc::new(ConcurrentFetcher::new(api, config(2, 0)));

    let request = FetchRequest::new("o/r", "dev", paths(&["x.md"])).unwrap();
    let report = fetcher.fetch_batch(&request).await;

    assert_eq!(report.documents[0].id.as_str(), "o/r:dev:x.md");
}

#[test]
fn blocking_fetch_runs_without_caller_runtime() {
    let api = Arc::new(FakeApi::default());
    let fetcher = ConcurrentFetcher::new(api.clone(), config(2, 0));

    let report = fetcher
        .fetch_blocking("o/r", &paths(&["a.md", "b.md"]), "main")
        .unwrap();

    assert_eq!(report.documents.len(), 2);
    assert_eq!(api.calls().len(), 2);
}

#[test]
fn blocking_fetch_rejects_bad_repo() {
    let fetcher = ConcurrentFetcher::new(FakeApi::default(), config(2, 0));

    let result = fetcher.fetch_blocking("nope", &paths(&["a.md"]), "main");

    assert!(result.is_err());
}
