//! Provider capability trait and its enum-dispatch facade.
//!
//! `VcsProvider` is what the review pipeline consumes. Each concrete client
//! implements it, and `ProviderClient` wraps them without async-trait or
//! dynamic trait objects.

pub mod types;
pub use types::*;

pub mod github;
pub mod gitlab;

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::errors::{GitContextEngineConfigError, GitContextEngineResult};

/// Operations the review pipeline needs from a VCS provider.
///
/// Futures are `Send` so a review can be spawned onto the Tokio runtime.
pub trait VcsProvider: Send + Sync {
    /// Changed files (with parsed diffs and current content) plus anchors.
    fn fetch_changed_files(
        &self,
        id: &ChangeRequestId,
    ) -> impl Future<Output = GitContextEngineResult<ChangedFiles>> + Send;

    /// All comments currently on the change request, inline and notes.
    fn fetch_existing_comments(
        &self,
        id: &ChangeRequestId,
    ) -> impl Future<Output = GitContextEngineResult<Vec<ExistingComment>>> + Send;

    fn delete_comment(
        &self,
        id: &ChangeRequestId,
        comment: &ExistingComment,
    ) -> impl Future<Output = GitContextEngineResult<()>> + Send;

    /// Posts a diff-bound comment. A rejected position surfaces as an error.
    fn submit_positioned_comment(
        &self,
        id: &ChangeRequestId,
        anchors: &DiffAnchorContext,
        position: &PositionPayload,
        body: &str,
    ) -> impl Future<Output = GitContextEngineResult<()>> + Send;

    fn submit_plain_note(
        &self,
        id: &ChangeRequestId,
        body: &str,
    ) -> impl Future<Output = GitContextEngineResult<()>> + Send;

    fn submit_summary(
        &self,
        id: &ChangeRequestId,
        body: &str,
    ) -> impl Future<Output = GitContextEngineResult<()>> + Send;
}

/// Runtime configuration for any provider client.
///
/// Usually loaded with [`ProviderConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// API base, e.g. "https://gitlab.com/api/v4" or "https://api.github.com".
    pub base_api: String,
    /// Access token for the provider (PAT or app token).
    pub token: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Reads `GIT_PROVIDER` (default `gitlab`), `GIT_API_BASE` (default per
    /// provider), `GIT_TOKEN` (required) and `GIT_HTTP_TIMEOUT_SECS`
    /// (default 30).
    pub fn from_env() -> GitContextEngineResult<Self> {
        let kind = match env_opt("GIT_PROVIDER") {
            Some(raw) => raw.parse::<ProviderKind>()?,
            None => ProviderKind::GitLab,
        };

        let base_api = env_opt("GIT_API_BASE")
            .unwrap_or_else(|| kind.default_api_base().to_string())
            .trim_end_matches('/')
            .to_string();
        if !(base_api.starts_with("http://") || base_api.starts_with("https://")) {
            return Err(GitContextEngineConfigError::InvalidBaseUrl(base_api).into());
        }

        let token = env_opt("GIT_TOKEN").ok_or(GitContextEngineConfigError::MissingToken)?;

        let timeout_secs = match env_opt("GIT_HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map_err(|_| GitContextEngineConfigError::InvalidValue {
                    var: "GIT_HTTP_TIMEOUT_SECS",
                    reason: "expected u64",
                })?,
            None => 30,
        };

        Ok(Self {
            kind,
            base_api,
            token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

pub(crate) fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Concrete provider client with enum dispatch.
///
/// This type is the main entry point for all Git interactions in the system.
#[derive(Debug, Clone)]
pub enum ProviderClient {
    GitLab(gitlab::GitLabClient),
    GitHub(github::GitHubClient),
}

impl ProviderClient {
    /// Constructs a concrete provider client from generic configuration.
    ///
    /// The underlying HTTP client is shared and configured with a stable
    /// user agent so that providers can identify the integration.
    pub fn from_config(cfg: ProviderConfig) -> GitContextEngineResult<Self> {
        debug!(
            "Initializing provider client: kind={:?}, base_api={}",
            cfg.kind, cfg.base_api
        );

        let client = reqwest::Client::builder()
            .user_agent("git-context-engine/0.1")
            .timeout(cfg.timeout)
            .build()?;

        let client = match cfg.kind {
            ProviderKind::GitLab => {
                ProviderClient::GitLab(gitlab::GitLabClient::new(client, cfg.base_api, cfg.token))
            }
            ProviderKind::GitHub => {
                ProviderClient::GitHub(github::GitHubClient::new(client, cfg.base_api, cfg.token))
            }
        };

        Ok(client)
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::GitLab(_) => ProviderKind::GitLab,
            Self::GitHub(_) => ProviderKind::GitHub,
        }
    }
}

impl VcsProvider for ProviderClient {
    async fn fetch_changed_files(&self, id: &ChangeRequestId) -> GitContextEngineResult<ChangedFiles> {
        debug!("Fetching changed files: project={}, iid={}", id.project, id.iid);
        match self {
            Self::GitLab(c) => c.fetch_changed_files(id).await,
            Self::GitHub(c) => c.fetch_changed_files(id).await,
        }
    }

    async fn fetch_existing_comments(
        &self,
        id: &ChangeRequestId,
    ) -> GitContextEngineResult<Vec<ExistingComment>> {
        match self {
            Self::GitLab(c) => c.fetch_existing_comments(id).await,
            Self::GitHub(c) => c.fetch_existing_comments(id).await,
        }
    }

    async fn delete_comment(
        &self,
        id: &ChangeRequestId,
        comment: &ExistingComment,
    ) -> GitContextEngineResult<()> {
        match self {
            Self::GitLab(c) => c.delete_comment(id, comment).await,
            Self::GitHub(c) => c.delete_comment(id, comment).await,
        }
    }

    async fn submit_positioned_comment(
        &self,
        id: &ChangeRequestId,
        anchors: &DiffAnchorContext,
        position: &PositionPayload,
        body: &str,
    ) -> GitContextEngineResult<()> {
        match self {
            Self::GitLab(c) => c.submit_positioned_comment(id, anchors, position, body).await,
            Self::GitHub(c) => c.submit_positioned_comment(id, anchors, position, body).await,
        }
    }

    async fn submit_plain_note(&self, id: &ChangeRequestId, body: &str) -> GitContextEngineResult<()> {
        match self {
            Self::GitLab(c) => c.submit_note(id, body).await,
            Self::GitHub(c) => c.submit_issue_comment(id, body).await,
        }
    }

    async fn submit_summary(&self, id: &ChangeRequestId, body: &str) -> GitContextEngineResult<()> {
        debug!("Posting review summary: project={}, iid={}", id.project, id.iid);
        match self {
            Self::GitLab(c) => c.submit_note(id, body).await,
            Self::GitHub(c) => c.submit_issue_comment(id, body).await,
        }
    }
}
