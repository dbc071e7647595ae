pub mod ollama_service;
pub mod open_ai_service;

use std::time::Duration;

use crate::error_handler::AiLlmError;

/// Maps a transport failure to [`AiLlmError::Timeout`] when it was a timeout.
pub(crate) fn map_transport(err: reqwest::Error, timeout: Duration) -> AiLlmError {
    if err.is_timeout() {
        AiLlmError::Timeout(timeout)
    } else {
        AiLlmError::HttpTransport(err)
    }
}
