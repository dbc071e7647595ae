//! Shared LLM service: one configured back-end, one `generate` call.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//!
//! # Example
//! ```no_run
//! use ai_llm_service::LlmService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ai_llm_service::AiLlmError> {
//!     let svc = LlmService::from_env()?;
//!     let txt = svc.generate("Review this diff", None).await?;
//!     println!("{txt}");
//!     Ok(())
//! }
//! ```

use tracing::info;

use crate::{
    config::{default_config::config_from_env, llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::AiLlmError,
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

/// Concrete back-end selected at construction time.
#[derive(Debug)]
enum Backend {
    Ollama(OllamaService),
    OpenAI(OpenAiService),
}

/// Text generation facade over the configured provider.
#[derive(Debug)]
pub struct LlmService {
    cfg: LlmModelConfig,
    backend: Backend,
}

impl LlmService {
    /// Builds the service for `cfg.provider`.
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        let backend = match cfg.provider {
            LlmProvider::Ollama => Backend::Ollama(OllamaService::new(cfg.clone())?),
            LlmProvider::OpenAI => Backend::OpenAI(OpenAiService::new(cfg.clone())?),
        };
        info!(provider = ?cfg.provider, model = %cfg.model, "llm service ready");
        Ok(Self { cfg, backend })
    }

    /// Loads the config from env (see [`config_from_env`]) and builds the service.
    pub fn from_env() -> Result<Self, AiLlmError> {
        Self::new(config_from_env()?)
    }

    /// Active model configuration.
    pub fn config(&self) -> &LlmModelConfig {
        &self.cfg
    }

    /// Single non-streaming generation.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        match &self.backend {
            Backend::Ollama(svc) => svc.generate(prompt, system).await,
            Backend::OpenAI(svc) => svc.generate(prompt, system).await,
        }
    }
}
