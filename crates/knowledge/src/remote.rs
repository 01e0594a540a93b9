//! HTTP client for an external knowledge service.
//!
//! Wire format:
//! `POST {endpoint}/search` with `{"query", "k", "fetchK", "lambda"}`,
//! answered by `{"documents": [RetrievedDocument...]}`.

use crate::service::KnowledgeService;
use crate::types::{RetrievedDocument, SearchRequest};
use orgchat_core::{AppError, AppResult, ServiceErrorKind};
use orgchat_llm::errors::{status_error, transport_error};
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "knowledge";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    documents: Vec<RetrievedDocument>,
}

/// Knowledge service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKnowledgeService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpKnowledgeService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[async_trait::async_trait]
impl KnowledgeService for HttpKnowledgeService {
    fn backend_name(&self) -> &str {
        "http"
    }

    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>> {
        tracing::debug!(k = request.k, fetch_k = request.fetch_k, "Querying knowledge service");

        let response = self
            .client
            .post(self.search_url())
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(SERVICE, status, &body));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            AppError::service(
                SERVICE,
                ServiceErrorKind::InvalidResponse,
                format!("Failed to parse search response: {}", e),
            )
        })?;

        let mut documents = body.documents;
        documents.truncate(request.k);
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url() {
        let service =
            HttpKnowledgeService::new("http://kb.local:9000/", Duration::from_secs(3)).unwrap();
        assert_eq!(service.search_url(), "http://kb.local:9000/search");
        assert_eq!(service.backend_name(), "http");
    }

    #[test]
    fn test_request_wire_format() {
        let request = SearchRequest::new("horaires du secrétariat");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["fetchK"], 30);
        assert_eq!(json["k"], 15);
    }

    #[test]
    fn test_response_parsing() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"documents":[{"content":"Ouvert le mardi","sourceId":"ev-1","sourceType":"event","lineRange":{"from":1,"to":3}}]}"#,
        )
        .unwrap();
        assert_eq!(body.documents.len(), 1);
        assert_eq!(body.documents[0].source_type, "event");

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.documents.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_retryable() {
        // Port 9 (discard) is closed on test machines; connection fails fast
        let service =
            HttpKnowledgeService::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = service.search(&SearchRequest::new("q")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
