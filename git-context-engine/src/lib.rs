//! Merge-request review core: diff parsing, provider clients, model output
//! normalization and idempotent comment posting.

pub mod errors;
pub mod git_providers;
pub mod lang;
pub mod parser;
pub mod review;

pub use errors::{
    GitContextEngineConfigError, GitContextEngineError, GitContextEngineProviderError,
    GitContextEngineResult, ReviewError,
};
pub use git_providers::{ProviderClient, ProviderConfig, VcsProvider};
pub use review::ReviewRunner;
pub use review::config::ReviewConfig;
pub use review::model::ModelProvider;
pub use review::store::{InMemoryReviewStore, ReviewStore};
pub use review::types::{ReviewOutcome, ReviewStatus};
