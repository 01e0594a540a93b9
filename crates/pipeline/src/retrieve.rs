//! Retrieval stage.
//!
//! Unlike condensation, failure here is fatal to the request once retries
//! are exhausted: a context-dependent question is never answered blind.

use orgchat_core::config::KnowledgeSettings;
use orgchat_core::{AppResult, RetryPolicy};
use orgchat_knowledge::{KnowledgeService, RetrievedDocument, SearchRequest};

/// Build the search request for a standalone question.
pub fn search_request(question: &str, settings: &KnowledgeSettings) -> SearchRequest {
    SearchRequest::new(question).with_sizes(settings.k, settings.fetch_k, settings.lambda)
}

/// Run the diversity-aware search with retries.
pub async fn retrieve(
    knowledge: &dyn KnowledgeService,
    request: &SearchRequest,
    policy: &RetryPolicy,
) -> AppResult<Vec<RetrievedDocument>> {
    let documents = policy
        .execute(
            move || knowledge.search(request),
            |attempt, err| {
                tracing::debug!(attempt, error = %err, "Knowledge search attempt failed");
            },
        )
        .await?;

    tracing::info!(
        backend = knowledge.backend_name(),
        documents = documents.len(),
        "Retrieved passages"
    );

    Ok(documents)
}
