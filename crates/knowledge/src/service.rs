//! Knowledge service abstraction.
//!
//! The pipeline only ever talks to this trait; the HTTP client and the
//! in-memory store are two interchangeable backends.

use crate::types::{RetrievedDocument, SearchRequest};
use orgchat_core::AppResult;

/// Trait for knowledge retrieval backends.
///
/// Implementations must be safe to call concurrently from many requests.
/// Failures are reported as classified service errors so the caller's retry
/// policy can decide what to do with them.
#[async_trait::async_trait]
pub trait KnowledgeService: Send + Sync {
    /// Backend name for logging ("http", "memory").
    fn backend_name(&self) -> &str;

    /// Diversity-aware similarity search.
    ///
    /// Returns at most `request.k` documents ordered by rank.
    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>>;
}
