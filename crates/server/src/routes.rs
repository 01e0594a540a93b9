//! HTTP routes.
//!
//! - `POST /api/chat`: stream the answer to a conversation as
//!   `"<json>\n\n"` frames
//! - `GET /health`: liveness probe

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use orgchat_core::ConversationMessage;
use orgchat_pipeline::{
    channel, frames, run_request, validate_messages, AnswerPipeline, DEFAULT_CHANNEL_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tower_http::trace::TraceLayer;

/// Inbound chat request.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ConversationMessage>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the application router.
pub fn router(pipeline: AnswerPipeline) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .with_state(pipeline)
        .layer(TraceLayer::new_for_http())
}

fn reject(message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Validate synchronously, then hand the request to a pipeline task and
/// return the streaming response right away so headers go out first.
async fn chat(
    State(pipeline): State<AnswerPipeline>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            tracing::debug!("Rejected chat body: {}", rejection.body_text());
            return reject(rejection.body_text());
        }
    };

    if let Err(e) = validate_messages(&request.messages) {
        return reject(e.to_string());
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        request_id = %request_id,
        messages = request.messages.len(),
        "Chat request accepted"
    );

    let (sink, rx) = channel(DEFAULT_CHANNEL_CAPACITY);
    tokio::spawn(run_request(pipeline, request_id, request.messages, sink));

    let body = Body::from_stream(frames(rx).map(Ok::<_, Infallible>));
    stream_response(body)
}

fn stream_response(body: Body) -> Response {
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use futures::stream;
    use http_body_util::BodyExt;
    use orgchat_core::{AppConfig, AppResult};
    use orgchat_knowledge::{KnowledgeService, RetrievedDocument, SearchRequest};
    use orgchat_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
    use orgchat_pipeline::{Services, StreamEvent};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Always classifies as needing context, then streams two chunks.
    struct ScriptedLlm;

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: r#"{"standaloneQuestion":"Horaires du local ?","needsContext":true}"#
                    .to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                done: true,
            })
        }

        async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
            let model = request.model.clone();
            Ok(Box::pin(stream::iter(vec![
                Ok(LlmStreamChunk::content("Ouvert ", model.clone())),
                Ok(LlmStreamChunk::content("le samedi.", model.clone())),
                Ok(LlmStreamChunk::finished(model, None)),
            ])))
        }
    }

    struct OneDocument;

    #[async_trait::async_trait]
    impl KnowledgeService for OneDocument {
        fn backend_name(&self) -> &str {
            "one"
        }

        async fn search(&self, _request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>> {
            Ok(vec![RetrievedDocument::new(
                "Le local est ouvert le samedi.",
                "art-1",
                "article",
            )])
        }
    }

    fn app() -> Router {
        let services = Services::with_clients(
            AppConfig::default(),
            Arc::new(ScriptedLlm),
            Arc::new(OneDocument),
        );
        router(AnswerPipeline::new(Arc::new(services)))
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_streams_frames() {
        let response = app()
            .oneshot(chat_request(
                r#"{"messages":[{"role":"user","content":"Le local ouvre quand ?"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream; charset=utf-8"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache, no-transform");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let body = body_string(response).await;
        let events: Vec<StreamEvent> = body
            .split("\n\n")
            .filter(|f| !f.is_empty())
            .map(|f| serde_json::from_str(f).unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::content("Ouvert "),
                StreamEvent::content("le samedi."),
                StreamEvent::done()
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let response = app().oneshot(chat_request("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_rejected() {
        let response = app()
            .oneshot(chat_request(r#"{"messages":[{"role":"robot","content":"x"}]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_messages_are_rejected() {
        let response = app().oneshot(chat_request(r#"{"messages":[]}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_last_message_is_rejected() {
        let response = app()
            .oneshot(chat_request(
                r#"{"messages":[{"role":"user","content":"Bonjour"},{"role":"user","content":"   "}]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["error"].as_str().unwrap().contains("non-empty"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
