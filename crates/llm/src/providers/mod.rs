//! LLM provider implementations.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use orgchat_core::{AppError, AppResult};
use std::time::Duration;

/// HTTP client shared by the providers.
///
/// `timeout` bounds connecting and every wait for more body bytes, not the
/// whole response, so a long answer keeps streaming while tokens arrive.
/// Non-streaming calls add a total deadline per request on top.
pub(crate) fn http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}
