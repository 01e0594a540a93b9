//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{
    ChunkKind, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
use crate::errors::{status_error, stream_payload_error, transport_error};
use crate::providers::http_client;
use futures::{Stream, StreamExt};
use orgchat_core::{AppError, AppResult, ServiceErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

const SERVICE: &str = "llm";

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
    stream: bool,
}

#[derive(Debug, Serialize, Default)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format; streaming lines share the same shape.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,

    /// Total deadline for non-streaming calls
    timeout: Option<Duration>,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: None,
        }
    }

    /// Create a client that gives up after `timeout` without progress.
    ///
    /// Completions must finish within `timeout`; streams only need to keep
    /// producing bytes at least that often.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
            timeout: Some(timeout),
        })
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            format: request.json_output.then_some("json"),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
            stream: request.stream,
        }
    }

    /// Convert Ollama response to LlmResponse.
    fn convert_response(&self, response: OllamaResponse) -> LlmResponse {
        let usage = response.usage();

        LlmResponse {
            content: response.response,
            model: response.model,
            usage,
            done: response.done,
        }
    }

    async fn post(
        &self,
        body: &OllamaRequest,
        total: Option<Duration>,
    ) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        let mut builder = self.client.post(&url).json(body);
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

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending completion request to Ollama");

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = false;

        let response = self.post(&ollama_request, self.timeout).await?;

        // For non-streaming, Ollama returns a single JSON object
        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            AppError::service(
                SERVICE,
                ServiceErrorKind::InvalidResponse,
                format!("Failed to parse Ollama response: {}", e),
            )
        })?;

        if let Some(error) = ollama_response.error {
            return Err(AppError::service(SERVICE, ServiceErrorKind::Server, error));
        }

        tracing::debug!(model = %ollama_response.model, "Received completion from Ollama");

        Ok(self.convert_response(ollama_response))
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, "Starting streaming request to Ollama");

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = true; // Ensure streaming is enabled

        let response = self.post(&ollama_request, None).await?;

        Ok(Box::pin(ndjson_chunks(Box::pin(response.bytes_stream()))))
    }
}

/// Accumulates bytes and yields complete newline-terminated lines.
///
/// Network chunks do not respect line boundaries; a JSON line can be split
/// across two reads.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

struct NdjsonState<S> {
    inner: S,
    buffer: LineBuffer,
    ready: VecDeque<AppResult<LlmStreamChunk>>,
    exhausted: bool,
}

/// Turn Ollama's newline-delimited JSON body into stream chunks.
fn ndjson_chunks<S, B>(inner: S) -> impl Stream<Item = AppResult<LlmStreamChunk>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin + Send,
    B: AsRef<[u8]> + Send,
{
    let state = NdjsonState {
        inner,
        buffer: LineBuffer::default(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.exhausted {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    for line in state.buffer.push(bytes.as_ref()) {
                        state.ready.extend(parse_line(&line));
                    }
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    state.ready.push_back(Err(transport_error(SERVICE, &e)));
                }
                None => {
                    state.exhausted = true;
                    if let Some(line) = state.buffer.finish() {
                        state.ready.extend(parse_line(&line));
                    }
                }
            }
        }
    })
}

/// Parse one NDJSON line into zero, one or two chunks (reasoning, then content).
fn parse_line(line: &str) -> Vec<AppResult<LlmStreamChunk>> {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            return vec![Err(AppError::service(
                SERVICE,
                ServiceErrorKind::InvalidResponse,
                format!("Failed to parse chunk: {}", e),
            ))]
        }
    };

    if value.get("error").is_some() {
        return vec![Err(stream_payload_error(SERVICE, &value))];
    }

    let line: OllamaResponse = match serde_json::from_value(value) {
        Ok(line) => line,
        Err(e) => {
            return vec![Err(AppError::service(
                SERVICE,
                ServiceErrorKind::InvalidResponse,
                format!("Unexpected chunk shape: {}", e),
            ))]
        }
    };

    let mut chunks = Vec::new();

    if let Some(thinking) = line.thinking.as_ref().filter(|t| !t.is_empty()) {
        chunks.push(Ok(LlmStreamChunk {
            content: thinking.clone(),
            kind: ChunkKind::Reasoning,
            model: line.model.clone(),
            done: false,
            usage: None,
        }));
    }

    if !line.response.is_empty() || line.done {
        chunks.push(Ok(LlmStreamChunk {
            content: line.response.clone(),
            kind: ChunkKind::Content,
            model: line.model.clone(),
            done: line.done,
            usage: line.done.then(|| line.usage()),
        }));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::with_base_url("http://localhost:11434/");
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("Hello", "llama3")
            .with_temperature(0.7)
            .with_max_tokens(100)
            .with_json_output();

        let ollama_req = client.to_ollama_request(&request);
        assert_eq!(ollama_req.model, "llama3");
        assert_eq!(ollama_req.prompt, "Hello");
        assert_eq!(ollama_req.format, Some("json"));
        assert_eq!(ollama_req.options.temperature, Some(0.7));
        assert_eq!(ollama_req.options.num_predict, Some(100));
    }

    #[test]
    fn test_line_buffer_split_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"{\"response\":\"Bon").is_empty());
        let lines = buffer.push(b"jour\"}\n{\"response\":\"!\"}\n{\"done\"");
        assert_eq!(lines, vec![r#"{"response":"Bonjour"}"#, r#"{"response":"!"}"#]);
        assert!(buffer.push(b":true}").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some(r#"{"done":true}"#));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_parse_line_thinking_and_done() {
        let chunks = parse_line(r#"{"model":"m","response":"","thinking":"hmm","done":false}"#);
        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert_eq!(chunk.kind, ChunkKind::Reasoning);
        assert_eq!(chunk.content, "hmm");

        let chunks = parse_line(
            r#"{"model":"m","response":"","done":true,"prompt_eval_count":3,"eval_count":4}"#,
        );
        let chunk = chunks[0].as_ref().unwrap();
        assert!(chunk.done);
        assert_eq!(chunk.usage.as_ref().unwrap().total_tokens, 7);
    }

    #[test]
    fn test_parse_line_error_payload() {
        let chunks = parse_line(r#"{"error":"model crashed"}"#);
        let err = chunks[0].as_ref().unwrap_err();
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Server));
    }

    /// Serve one chunked NDJSON response, writing `lines` with `gap` between them.
    async fn slow_ndjson_server(lines: Vec<String>, gap: Duration) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Read the request: headers, then Content-Length bytes of body
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\n\r\n",
                )
                .await
                .unwrap();
            for line in lines {
                tokio::time::sleep(gap).await;
                let data = format!("{}\n", line);
                let frame = format!("{:x}\r\n{}\r\n", data.len(), data);
                socket.write_all(frame.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn token_lines(count: usize) -> Vec<String> {
        let mut lines: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"model":"m","response":"tok{} ","done":false}}"#, i))
            .collect();
        lines.push(r#"{"model":"m","response":"","done":true}"#.to_string());
        lines
    }

    #[tokio::test]
    async fn test_stream_outlives_timeout_while_tokens_flow() {
        // 7 lines at 150ms: about 1s of streaming against a 400ms timeout
        let base_url = slow_ndjson_server(token_lines(6), Duration::from_millis(150)).await;
        let client = OllamaClient::with_timeout(base_url, Duration::from_millis(400)).unwrap();

        let request = LlmRequest::new("Hello", "m").with_streaming();
        let chunks: Vec<_> = client.stream(&request).await.unwrap().collect().await;

        let chunks: Vec<LlmStreamChunk> = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[5].content, "tok5 ");
        assert!(chunks.last().unwrap().done);
    }

    #[tokio::test]
    async fn test_stream_stalled_past_timeout_fails() {
        let base_url = slow_ndjson_server(token_lines(1), Duration::from_millis(800)).await;
        let client = OllamaClient::with_timeout(base_url, Duration::from_millis(200)).unwrap();

        let request = LlmRequest::new("Hello", "m").with_streaming();
        let chunks: Vec<_> = client.stream(&request).await.unwrap().collect().await;

        let err = chunks.last().unwrap().as_ref().unwrap_err();
        assert_eq!(err.service_kind(), Some(ServiceErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_ndjson_stream_reassembles_chunks() {
        let parts: Vec<Result<Vec<u8>, reqwest::Error>> = vec![
            Ok(b"{\"model\":\"m\",\"response\":\"Bon".to_vec()),
            Ok(b"jour\"}\n{\"model\":\"m\",\"response\":\" !\"}\n".to_vec()),
            Ok(b"{\"model\":\"m\",\"response\":\"\",\"done\":true}".to_vec()),
        ];

        let chunks: Vec<_> = ndjson_chunks(futures::stream::iter(parts)).collect().await;
        let texts: Vec<String> = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().content.clone())
            .collect();
        assert_eq!(texts, vec!["Bonjour", " !", ""]);
        assert!(chunks[2].as_ref().unwrap().done);
    }
}
