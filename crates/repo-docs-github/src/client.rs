use std::time::Duration;

use reqwest::Url;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings shared by every GitHub call.
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    /// Sent as a bearer token when present. Unauthenticated calls work but
    /// hit lower rate limits.
    pub token: Option<String>,
    pub api_base_url: Option<String>,
    /// Per-request timeout, covering connect through reading the body.
    pub timeout: Duration,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Thin wrapper over a pooled `reqwest::Client` that knows the API base
/// and attaches GitHub headers.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    settings: GitHubSettings,
}

impl GitHubClient {
    pub fn new(settings: GitHubSettings) -> Result<Self, reqwest::Error> {
        Self::with_pool_limit(settings, usize::MAX)
    }

    /// Build a client whose idle pool per host is capped at `max_idle_per_host`.
    pub fn with_pool_limit(
        settings: GitHubSettings,
        max_idle_per_host: usize,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(max_idle_per_host)
            .build()?;

        Ok(Self { http, settings })
    }

    pub fn api_base(&self) -> &str {
        self.settings
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Join `segments` onto the API base, percent-encoding each one.
    pub fn endpoint<I>(&self, segments: I) -> Result<Url, InvalidBaseUrl>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let base = self.api_base();
        let mut url = Url::parse(base).map_err(|e| InvalidBaseUrl(format!("{base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| InvalidBaseUrl(base.to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(url)
            .header("User-Agent", "repo-docs")
            .header("Accept", "application/vnd.github.v3+json");

        if let Some(token) = &self.settings.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        req
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid API base URL: {0}")]
pub struct InvalidBaseUrl(pub String);

/// Keep at most `max_chars` characters of a response body for messages.
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
