//! In-memory knowledge store with MMR ranking.
//!
//! The corpus is a JSON array of documents (same shape as the HTTP service
//! returns). Every passage is embedded once at load time.

use crate::embeddings::EmbeddingProvider;
use crate::mmr::{mmr_select, top_candidates};
use crate::service::KnowledgeService;
use crate::types::{RetrievedDocument, SearchRequest};
use orgchat_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Local knowledge backend holding documents and their embeddings.
#[derive(Debug)]
pub struct InMemoryKnowledgeStore {
    documents: Vec<RetrievedDocument>,
    embeddings: Vec<Vec<f32>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl InMemoryKnowledgeStore {
    /// Embed `documents` and build the store.
    pub async fn from_documents(
        documents: Vec<RetrievedDocument>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != documents.len() {
            return Err(AppError::Other(format!(
                "Embedding provider returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        info!(
            documents = documents.len(),
            provider = embedder.provider_name(),
            model = embedder.model_name(),
            "Knowledge store loaded"
        );

        Ok(Self {
            documents,
            embeddings,
            embedder,
        })
    }

    /// Read a JSON corpus file and embed it.
    pub async fn from_file(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Config(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;
        let documents: Vec<RetrievedDocument> = serde_json::from_str(&content)?;
        Self::from_documents(documents, embedder).await
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait::async_trait]
impl KnowledgeService for InMemoryKnowledgeStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>> {
        if self.documents.is_empty() || request.k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(&request.query).await?;
        let candidates = top_candidates(&query, &self.embeddings, request.fetch_k.max(request.k));
        let picked = mmr_select(&query, &self.embeddings, &candidates, request.k, request.lambda);

        debug!(
            candidates = candidates.len(),
            returned = picked.len(),
            "MMR search complete"
        );

        Ok(picked
            .into_iter()
            .map(|i| self.documents[i].clone())
            .collect())
    }
}
