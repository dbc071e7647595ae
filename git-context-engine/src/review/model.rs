//! Model capability consumed by the review pipeline.

use std::future::Future;

use ai_llm_service::LlmService;
use tracing::{instrument, warn};

use crate::errors::ReviewError;
use crate::review::prompt::SYSTEM_PROMPT;

/// Anything that can turn a prompt into raw text.
pub trait ModelProvider: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, ReviewError>> + Send;
}

impl ModelProvider for LlmService {
    #[instrument(skip_all, fields(model = %self.config().model, prompt_len = prompt.len()))]
    async fn complete(&self, prompt: &str) -> Result<String, ReviewError> {
        self.generate(prompt, Some(SYSTEM_PROMPT)).await.map_err(|e| {
            if e.is_rate_limited() {
                warn!("model provider is rate limiting requests");
            }
            ReviewError::ModelCall(e.to_string())
        })
    }
}
