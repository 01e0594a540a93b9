//! Knowledge retrieval type definitions.

use serde::{Deserialize, Serialize};

/// Default number of documents returned by a search.
pub const DEFAULT_K: usize = 15;

/// Default candidate pool size before diversity re-ranking.
pub const DEFAULT_FETCH_K: usize = 30;

/// Default relevance/diversity trade-off.
pub const DEFAULT_LAMBDA: f32 = 0.7;

/// Inclusive line span of a passage within its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub from: u32,
    pub to: u32,
}

/// A passage returned by the knowledge service.
///
/// Results are ordered by rank; the order carries meaning and must be kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedDocument {
    /// Passage text
    pub content: String,

    /// Identifier of the originating entity or file
    pub source_id: String,

    /// Kind of source (e.g. "article", "event", "regulation", "file")
    pub source_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_range: Option<LineRange>,
}

impl RetrievedDocument {
    pub fn new(
        content: impl Into<String>,
        source_id: impl Into<String>,
        source_type: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            source_id: source_id.into(),
            source_type: source_type.into(),
            line_range: None,
        }
    }

    pub fn with_lines(mut self, from: u32, to: u32) -> Self {
        self.line_range = Some(LineRange { from, to });
        self
    }
}

/// Parameters of a diversity-aware similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Standalone question to search for
    pub query: String,

    /// Number of documents to return
    pub k: usize,

    /// Number of nearest candidates considered before re-ranking
    pub fetch_k: usize,

    /// 1.0 ranks by relevance only, 0.0 by diversity only
    pub lambda: f32,
}

impl SearchRequest {
    /// Search with the default sizes (k=15, fetchK=30, lambda=0.7).
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: DEFAULT_K,
            fetch_k: DEFAULT_FETCH_K,
            lambda: DEFAULT_LAMBDA,
        }
    }

    pub fn with_sizes(mut self, k: usize, fetch_k: usize, lambda: f32) -> Self {
        self.k = k;
        self.fetch_k = fetch_k.max(k);
        self.lambda = lambda.clamp(0.0, 1.0);
        self
    }
}
