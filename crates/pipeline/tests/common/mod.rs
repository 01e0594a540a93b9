//! Scripted fakes for the generation and knowledge services.

#![allow(dead_code)]

use futures::StreamExt;
use orgchat_core::{AppConfig, AppError, AppResult, RetryPolicy, ServiceErrorKind};
use orgchat_knowledge::{KnowledgeService, RetrievedDocument, SearchRequest};
use orgchat_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use orgchat_pipeline::{channel, frames, AnswerPipeline, PipelineState, Services, StreamEvent};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn service_error(kind: ServiceErrorKind) -> AppError {
    AppError::service("fake", kind, format!("scripted {} failure", kind))
}

/// What `complete` does on every call.
pub enum CondenseScript {
    Reply(String),
    Fail(ServiceErrorKind),
    /// Never answers within `Duration`
    Hang(Duration),
}

/// What one `stream` call does.
pub enum StreamScript {
    /// `stream()` itself fails
    Refuse(ServiceErrorKind),
    /// Yields the chunks then finishes
    Chunks(Vec<&'static str>),
    /// Yields the chunks then an error item
    ChunksThenFail(Vec<&'static str>, ServiceErrorKind),
}

pub struct FakeLlm {
    condense: CondenseScript,
    streams: Mutex<VecDeque<StreamScript>>,
    pub complete_calls: Mutex<Vec<String>>,
    pub stream_calls: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(condense: CondenseScript, streams: Vec<StreamScript>) -> Self {
        Self {
            condense,
            streams: Mutex::new(streams.into()),
            complete_calls: Mutex::new(Vec::new()),
            stream_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn condensing_to(json: &str, streams: Vec<StreamScript>) -> Self {
        Self::new(CondenseScript::Reply(json.to_string()), streams)
    }

    pub fn complete_count(&self) -> usize {
        self.complete_calls.lock().unwrap().len()
    }

    pub fn streamed_models(&self) -> Vec<String> {
        self.stream_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.complete_calls.lock().unwrap().push(request.model.clone());
        match &self.condense {
            CondenseScript::Reply(content) => Ok(LlmResponse {
                content: content.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 10),
                done: true,
            }),
            CondenseScript::Fail(kind) => Err(service_error(*kind)),
            CondenseScript::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Err(service_error(ServiceErrorKind::Timeout))
            }
        }
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.stream_calls.lock().unwrap().push(request.model.clone());
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StreamScript::Refuse(ServiceErrorKind::Client));

        let model = request.model.clone();
        let chunk = move |text: &str| -> AppResult<LlmStreamChunk> {
            Ok(LlmStreamChunk::content(text, model.clone()))
        };

        match script {
            StreamScript::Refuse(kind) => Err(service_error(kind)),
            StreamScript::Chunks(texts) => {
                let mut items: Vec<AppResult<LlmStreamChunk>> =
                    texts.iter().map(|t| chunk(*t)).collect();
                items.push(Ok(LlmStreamChunk::finished(request.model.clone(), None)));
                Ok(futures::stream::iter(items).boxed())
            }
            StreamScript::ChunksThenFail(texts, kind) => {
                let mut items: Vec<AppResult<LlmStreamChunk>> =
                    texts.iter().map(|t| chunk(*t)).collect();
                items.push(Err(service_error(kind)));
                Ok(futures::stream::iter(items).boxed())
            }
        }
    }
}

pub enum SearchScript {
    Found(Vec<RetrievedDocument>),
    Fail(ServiceErrorKind),
    Hang(Duration),
}

pub struct FakeKnowledge {
    script: SearchScript,
    pub queries: Mutex<Vec<String>>,
}

impl FakeKnowledge {
    pub fn new(script: SearchScript) -> Self {
        Self {
            script,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_documents() -> Self {
        Self::new(SearchScript::Found(vec![
            RetrievedDocument::new("Le bureau se réunit le premier mardi du mois.", "art-4", "article"),
            RetrievedDocument::new("Réunion suivante : mardi 4 mars à 19h.", "ev-9", "event"),
        ]))
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl KnowledgeService for FakeKnowledge {
    fn backend_name(&self) -> &str {
        "fake"
    }

    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>> {
        self.queries.lock().unwrap().push(request.query.clone());
        match &self.script {
            SearchScript::Found(docs) => Ok(docs.iter().take(request.k).cloned().collect()),
            SearchScript::Fail(kind) => Err(service_error(*kind)),
            SearchScript::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Vec::new())
            }
        }
    }
}

fn fast(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4), 2.0)
}

/// Configuration with tiny backoff delays and named models.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.organization = "Club de voile de Brest".to_string();
    config.llm.model = "primary-model".to_string();
    config.llm.light_model = "light-model".to_string();
    config.llm.condense_model = "condense-model".to_string();
    config.retry.condense = fast(3);
    config.retry.retrieval = fast(3);
    config.retry.generation = fast(5);
    config
}

/// Everything a run produced.
pub struct Run {
    pub state: PipelineState,
    pub body: String,
    pub events: Vec<StreamEvent>,
}

impl Run {
    pub fn content(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.kind == orgchat_pipeline::EventType::Content)
            .filter_map(|e| e.chunk.as_deref())
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_terminal()).count()
    }
}

/// Run the pipeline to completion and decode every frame of the body.
pub async fn run_pipeline(
    config: AppConfig,
    llm: Arc<FakeLlm>,
    knowledge: Arc<FakeKnowledge>,
    messages: Vec<orgchat_core::ConversationMessage>,
) -> Run {
    let services = Arc::new(Services::with_clients(config, llm, knowledge));
    let pipeline = AnswerPipeline::new(services);

    let (sink, rx) = channel(4);
    let collector = tokio::spawn(async move { frames(rx).collect::<Vec<String>>().await.concat() });
    let state = pipeline.run(messages, sink).await;
    let body = collector.await.unwrap();

    let events = body
        .split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            serde_json::from_str::<StreamEvent>(frame)
                .unwrap_or_else(|e| panic!("frame is not a StreamEvent: {frame:?}: {e}"))
        })
        .collect();

    Run { state, body, events }
}
