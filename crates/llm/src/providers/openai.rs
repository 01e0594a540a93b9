//! OpenAI-compatible chat completions provider.
//!
//! Works against any server exposing `/chat/completions` with the OpenAI wire
//! format (OpenAI, Mistral, Groq, vLLM, LiteLLM...). Streaming uses SSE.

use crate::client::{
    ChunkKind, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
use crate::errors::{status_error, stream_payload_error, transport_error};
use crate::providers::http_client;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use orgchat_core::{AppError, AppResult, ServiceErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const SERVICE: &str = "llm";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<ChatUsage> for LlmUsage {
    fn from(usage: ChatUsage) -> Self {
        LlmUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// OpenAI-compatible LLM client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create a client for `base_url` (defaults to the OpenAI API).
    pub fn new(
        base_url: Option<&str>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> AppResult<Self> {
        let client = http_client(timeout)?;

        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            client,
            timeout,
        })
    }

    fn to_chat_request(&self, request: &LlmRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_output
                .then(|| serde_json::json!({ "type": "json_object" })),
            stream,
        }
    }

    async fn post(
        &self,
        body: &ChatRequest,
        total: Option<Duration>,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self.client.post(&url).bearer_auth(&self.api_key).json(body);
        if let Some(total) = total {
            builder = builder.timeout(total);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(SERVICE, status, &error_text));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending chat completion request");

        let response = self
            .post(&self.to_chat_request(request, false), Some(self.timeout))
            .await?;
        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::service(
                SERVICE,
                ServiceErrorKind::InvalidResponse,
                format!("Failed to parse chat completion: {}", e),
            )
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::service(
                    SERVICE,
                    ServiceErrorKind::InvalidResponse,
                    "Chat completion has no content",
                )
            })?;

        Ok(LlmResponse {
            content,
            model: chat.model,
            usage: chat.usage.map(LlmUsage::from).unwrap_or_default(),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, "Starting streaming chat completion");

        let response = self
            .post(&self.to_chat_request(request, true), None)
            .await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .map(|event| match event {
                Ok(event) => parse_sse_data(&event.data),
                Err(e) => vec![Err(AppError::service(
                    SERVICE,
                    ServiceErrorKind::Network,
                    format!("SSE stream error: {}", e),
                ))],
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }
}

/// Parse the `data:` field of one SSE event.
fn parse_sse_data(data: &str) -> Vec<AppResult<LlmStreamChunk>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(LlmStreamChunk::finished("", None))];
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            return vec![Err(AppError::service(
                SERVICE,
                ServiceErrorKind::InvalidResponse,
                format!("SSE parsing error: {}", e),
            ))]
        }
    };

    if value.get("error").is_some() {
        return vec![Err(stream_payload_error(SERVICE, &value))];
    }

    let chunk: StreamChunk = match serde_json::from_value(value) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![Err(AppError::service(
                SERVICE,
                ServiceErrorKind::InvalidResponse,
                format!("SSE data schema error: {}", e),
            ))]
        }
    };

    let mut out = Vec::new();
    for choice in &chunk.choices {
        if let Some(reasoning) = choice.delta.reasoning_content.as_ref().filter(|r| !r.is_empty())
        {
            out.push(Ok(LlmStreamChunk {
                content: reasoning.clone(),
                kind: ChunkKind::Reasoning,
                model: chunk.model.clone(),
                done: false,
                usage: None,
            }));
        }
        if let Some(content) = choice.delta.content.as_ref().filter(|c| !c.is_empty()) {
            out.push(Ok(LlmStreamChunk::content(content.clone(), chunk.model.clone())));
        }
        if let Some(reason) = &choice.finish_reason {
            tracing::debug!(finish_reason = %reason, "Chat completion finished");
        }
    }

    // Usage arrives in a trailing chunk with empty choices when requested
    if let Some(usage) = chunk.usage {
        out.push(Ok(LlmStreamChunk::finished(chunk.model, Some(usage.into()))));
    }

    out
}
