//! Crate-wide error hierarchy for git-context-engine.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type GitContextEngineResult<T> = Result<T, GitContextEngineError>;

/// Root error type for the git-context-engine crate.
#[derive(Debug, Error)]
pub enum GitContextEngineError {
    /// Provider (GitLab/GitHub) related failure.
    #[error(transparent)]
    Provider(#[from] GitContextEngineProviderError),

    /// Configuration problems (bad/missing tokens, base URL, etc.).
    #[error(transparent)]
    Config(#[from] GitContextEngineConfigError),

    /// Review pipeline failure (fetch, model, parse, placement, cleanup).
    #[error(transparent)]
    Review(#[from] ReviewError),

    /// Input validation errors (bad IDs, unsupported formats, etc.).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Provider-specific error used inside the provider layer.
#[derive(Debug, Error)]
pub enum GitContextEngineProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited {
        /// Optional `Retry-After` hint in seconds when available.
        retry_after_secs: Option<u64>,
    },

    /// Gateway / server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (non-2xx) not covered by specific variants.
    /// Comment placement rejections (400/422) land here.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Operation is not supported by this provider with the given input.
    #[error("unsupported provider operation: {0}")]
    Unsupported(&'static str),
}

/// The review pipeline's failure taxonomy.
///
/// `DiffFetch`, `ModelCall` and `ResponseParse` fail the whole review.
/// `PositionResolution` and `CommentDeletion` are local: logged and skipped.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to fetch changes: {0}")]
    DiffFetch(String),

    #[error("model call failed: {0}")]
    ModelCall(String),

    #[error("model response could not be parsed: {0}")]
    ResponseParse(String),

    #[error("could not place comment on {file}:{line}: {reason}")]
    PositionResolution {
        file: String,
        line: u32,
        reason: String,
    },

    #[error("could not delete comment {id}: {reason}")]
    CommentDeletion { id: u64, reason: String },
}

/// Configuration and setup errors (base API URL, missing token, etc.).
#[derive(Debug, Error)]
pub enum GitContextEngineConfigError {
    /// Missing required provider access token.
    #[error("missing provider token")]
    MissingToken,

    /// Invalid base API URL.
    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),

    /// `GIT_PROVIDER` names a provider this crate does not speak.
    #[error("unsupported git provider: {0}")]
    UnsupportedProvider(String),

    /// A review setting had an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        reason: &'static str,
    },
}

// ===== Conversions for `?` ergonomics at the crate root =====

impl From<reqwest::Error> for GitContextEngineError {
    fn from(e: reqwest::Error) -> Self {
        GitContextEngineError::Provider(GitContextEngineProviderError::from(e))
    }
}

// ===== Mapping from reqwest::Error into GitContextEngineProviderError =====

impl From<reqwest::Error> for GitContextEngineProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return GitContextEngineProviderError::Timeout;
        }

        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => GitContextEngineProviderError::Unauthorized,
                403 => GitContextEngineProviderError::Forbidden,
                404 => GitContextEngineProviderError::NotFound,
                429 => GitContextEngineProviderError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => GitContextEngineProviderError::Server(code),
                _ => GitContextEngineProviderError::HttpStatus(code),
            };
        }

        if e.is_decode() {
            return GitContextEngineProviderError::InvalidResponse(e.to_string());
        }

        GitContextEngineProviderError::Network(e.to_string())
    }
}
