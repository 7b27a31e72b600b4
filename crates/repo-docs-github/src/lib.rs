pub mod api;
pub mod client;
pub mod content;
pub mod fetcher;
pub mod lister;
pub mod tree;

pub use api::{ContentApi, GitHubContentApi, RemoteFile};
pub use client::{GitHubClient, GitHubSettings, InvalidBaseUrl};
pub use fetcher::{BlockingFetchError, ConcurrentFetcher, FetcherConfig, GitHubFetcher, RetryScope};
pub use lister::{ListError, Listing, TreeLister};
