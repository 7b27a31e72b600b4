mod schema;
mod store;

pub use store::{DeleteSummary, RepoStats, RepoStore, StoreError};
