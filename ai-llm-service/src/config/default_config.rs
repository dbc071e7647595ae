//! Default LLM configs loaded strictly from environment variables.
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND`         = provider kind (`ollama` | `openai`), default `ollama`
//! - `LLM_MAX_TOKENS`   = optional max tokens (u32)
//! - `LLM_TEMPERATURE`  = optional sampling temperature (0.0..=2.0), default 0.2
//! - `LLM_TIMEOUT_SECS` = optional request timeout, default 600
//!
//! Ollama-specific:
//! - `OLLAMA_URL` or `OLLAMA_PORT` = endpoint (mandatory)
//! - `OLLAMA_MODEL`                = review model (mandatory)
//!
//! OpenAI-specific:
//! - `OPENAI_API_KEY` = API key (mandatory)
//! - `OPENAI_MODEL`   = model (mandatory)
//! - `OPENAI_URL`     = endpoint base, default `https://api.openai.com`

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        AiLlmError, ConfigError, env_opt, env_opt_f32, env_opt_u32, env_opt_u64, must_env,
        validate_http_endpoint, validate_range_f32,
    },
};

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TIMEOUT_SECS: u64 = 600;
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Resolves the Ollama endpoint strictly from environment.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
///
/// # Errors
///
/// - [`ConfigError::MissingVar`] if both are missing
/// - [`ConfigError::InvalidNumber`] if `OLLAMA_PORT` is invalid
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Some(url) = env_opt("OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", &url)?;
        return Ok(url);
    }
    if let Some(port) = env_opt("OLLAMA_PORT") {
        port.trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
        return Ok(format!("http://localhost:{}", port.trim()));
    }
    Err(AiLlmError::Config(ConfigError::MissingVar(
        "OLLAMA_URL or OLLAMA_PORT",
    )))
}

/// Sampling knobs shared by every provider.
fn common_knobs() -> Result<(Option<u32>, f32, u64), AiLlmError> {
    let max_tokens = env_opt_u32("LLM_MAX_TOKENS")?;
    let temperature = env_opt_f32("LLM_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE);
    validate_range_f32("temperature", temperature, 0.0, 2.0)?;
    let timeout = env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
    Ok((max_tokens, temperature, timeout))
}

/// Constructs a config for the Ollama review model.
///
/// # Env
/// - `OLLAMA_URL` / `OLLAMA_PORT` (required)
/// - `OLLAMA_MODEL` (required)
pub fn config_ollama() -> Result<LlmModelConfig, AiLlmError> {
    let endpoint = ollama_endpoint()?;
    let model = must_env("OLLAMA_MODEL")?;
    let (max_tokens, temperature, timeout) = common_knobs()?;

    Ok(LlmModelConfig {
        provider: LlmProvider::Ollama,
        model,
        endpoint,
        api_key: None,
        max_tokens,
        temperature: Some(temperature),
        top_p: None,
        timeout_secs: Some(timeout),
    })
}

/// Constructs a config for an OpenAI-compatible chat model.
///
/// # Env
/// - `OPENAI_API_KEY` (required)
/// - `OPENAI_MODEL` (required)
/// - `OPENAI_URL` (optional)
pub fn config_openai() -> Result<LlmModelConfig, AiLlmError> {
    let api_key = must_env("OPENAI_API_KEY")?;
    let model = must_env("OPENAI_MODEL")?;
    let endpoint = env_opt("OPENAI_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
    validate_http_endpoint("OPENAI_URL", &endpoint)?;
    let (max_tokens, temperature, timeout) = common_knobs()?;

    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAI,
        model,
        endpoint,
        api_key: Some(api_key),
        max_tokens,
        temperature: Some(temperature),
        top_p: None,
        timeout_secs: Some(timeout),
    })
}

/// Picks the provider from `LLM_KIND` (default `ollama`) and loads its config.
pub fn config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let kind = match env_opt("LLM_KIND") {
        Some(raw) => raw.parse::<LlmProvider>()?,
        None => LlmProvider::Ollama,
    };
    let cfg = match kind {
        LlmProvider::Ollama => config_ollama()?,
        LlmProvider::OpenAI => config_openai()?,
    };
    if cfg.model.trim().is_empty() {
        return Err(ConfigError::EmptyModel.into());
    }
    Ok(cfg)
}
