//! Shared LLM generation service used by the merge-request reviewer.
//!
//! - [`llm_service::LlmService`] is the single entry point: construct once
//!   (usually via [`llm_service::LlmService::from_env`]) and share it.
//! - Back-ends live in [`services`] (Ollama, OpenAI-compatible chat).
//! - Errors are unified in [`error_handler::AiLlmError`].

pub mod config;
pub mod error_handler;
pub mod llm_service;
pub mod services;
pub mod telemetry;

pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::AiLlmError;
pub use llm_service::LlmService;
