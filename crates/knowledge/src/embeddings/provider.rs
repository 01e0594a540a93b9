//! Embedding provider trait and factory.

use super::providers::{OllamaProvider, TrigramProvider};
use orgchat_core::{AppError, AppResult, ServiceErrorKind};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results.pop().ok_or_else(|| {
            AppError::service(
                "embeddings",
                ServiceErrorKind::InvalidResponse,
                "No embedding returned",
            )
        })
    }
}

/// Create an embedding provider by name.
///
/// `base_url` and `timeout` only matter for network-backed providers.
pub fn create_provider(
    name: &str,
    model: &str,
    dimensions: usize,
    base_url: Option<&str>,
    timeout: Duration,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if dimensions == 0 {
        return Err(AppError::Config(
            "Embedding dimensions must be greater than zero".to_string(),
        ));
    }

    match name {
        "trigram" => Ok(Arc::new(TrigramProvider::new(dimensions))),

        "ollama" => {
            let provider = OllamaProvider::new(model, dimensions, timeout)?;
            let provider = match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            };
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            name
        ))),
    }
}
