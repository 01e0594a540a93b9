//! Knowledge backend factory.

use crate::embeddings::create_provider;
use crate::memory::InMemoryKnowledgeStore;
use crate::remote::HttpKnowledgeService;
use crate::service::KnowledgeService;
use orgchat_core::config::KnowledgeSettings;
use orgchat_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Build the configured knowledge backend.
///
/// `embedding_base_url` is the Ollama endpoint used when the in-memory
/// backend embeds with the "ollama" provider.
pub async fn create_service(
    settings: &KnowledgeSettings,
    embedding_base_url: Option<&str>,
) -> AppResult<Arc<dyn KnowledgeService>> {
    let timeout = Duration::from_secs(settings.timeout_secs);

    match settings.backend.as_str() {
        "http" => {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("knowledge.endpoint is required for the http backend".to_string())
            })?;
            tracing::info!(endpoint, "Using remote knowledge service");
            Ok(Arc::new(HttpKnowledgeService::new(endpoint, timeout)?))
        }

        "memory" => {
            let embedder = create_provider(
                &settings.embedding_provider,
                &settings.embedding_model,
                settings.dimensions,
                embedding_base_url,
                timeout,
            )?;

            let store = match &settings.corpus_path {
                Some(path) => InMemoryKnowledgeStore::from_file(path, embedder).await?,
                None => {
                    tracing::warn!("No corpus configured; knowledge store is empty");
                    InMemoryKnowledgeStore::from_documents(Vec::new(), embedder).await?
                }
            };
            Ok(Arc::new(store))
        }

        other => Err(AppError::Config(format!(
            "Unknown knowledge backend: '{}'. Supported backends: http, memory",
            other
        ))),
    }
}
