//! Per-request answer pipeline.
//!
//! `Init -> Condensing -> {DirectAnswer | Retrieving -> Generating} -> Done`,
//! with `Error` reachable from `Retrieving` and `Generating`. Exactly one
//! terminal event is sent per request, unless the caller disconnects, in
//! which case nothing more is sent at all.

use crate::condense::{self, CondenseOptions};
use crate::emitter::EventSink;
use crate::events::{PipelineState, StreamEvent};
use crate::generate::{self, Degradation, ForwardOutcome, ModelTier};
use crate::retrieve;
use crate::services::Services;
use orgchat_core::{AppError, ConversationMessage, ServiceErrorKind};
use orgchat_llm::LlmRequest;
use orgchat_prompt::{build_answer_prompt, PromptContext};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

const RETRIEVAL_FAILED: &str =
    "The knowledge base is unavailable right now. Please try again in a moment.";
const GENERATION_FAILED: &str =
    "The answer could not be generated right now. Please try again in a moment.";

/// Why a stage did not produce a value.
#[derive(Debug)]
enum Interrupted {
    /// The caller went away
    Disconnected,
    /// The stage failed; the message is sent as the terminal error event
    Failed { public: &'static str, cause: AppError },
}

/// One pipeline per request, sharing process-wide [`Services`].
#[derive(Clone)]
pub struct AnswerPipeline {
    services: Arc<Services>,
}

impl AnswerPipeline {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Run the pipeline for one request, sending events to `sink`.
    ///
    /// `messages` must end with a non-blank message. Returns the terminal
    /// state reached.
    pub async fn run(&self, messages: Vec<ConversationMessage>, sink: EventSink) -> PipelineState {
        let mut state = PipelineState::Init;
        let result = self.drive(&messages, &sink, &mut state).await;

        let terminal = match result {
            Ok(end) => {
                if !sink.send(StreamEvent::done()).await {
                    tracing::info!("Caller disconnected before the final event");
                }
                end
            }
            Err(Interrupted::Disconnected) => PipelineState::Cancelled,
            Err(Interrupted::Failed { public, cause }) => {
                tracing::error!(stage = %state, error = %cause, "Request failed");
                sink.send(StreamEvent::error(public)).await;
                PipelineState::Error
            }
        };

        transition(&mut state, terminal);
        state
    }

    async fn drive(
        &self,
        messages: &[ConversationMessage],
        sink: &EventSink,
        state: &mut PipelineState,
    ) -> Result<PipelineState, Interrupted> {
        let config = self.services.config();
        let emit_reasoning = config.pipeline.emit_reasoning;
        let prompt_ctx = PromptContext {
            organization: &config.organization,
            locale: &config.locale,
        };
        let last_message = messages
            .last()
            .map(|m| m.content.trim())
            .unwrap_or_default();

        // Condensing
        transition(state, PipelineState::Condensing);
        let options = CondenseOptions {
            model: &config.llm.condense_model,
            prompt: prompt_ctx,
            policy: &config.retry.condense,
        };
        let outcome = match self.services.llm().await {
            Ok(llm) => {
                let attempt = async {
                    Ok::<_, AppError>(condense::condense(llm.as_ref(), messages, &options).await)
                };
                match self.guard(sink, attempt).await {
                    Ok(outcome) => outcome,
                    Err(Interrupted::Failed { cause, .. }) => condense::fallback(last_message, &cause),
                    Err(disconnected) => return Err(disconnected),
                }
            }
            Err(err) => condense::fallback(last_message, &err),
        };

        if emit_reasoning {
            let note = match &outcome.fallback_reason {
                Some(_) => format!(
                    "Question rewriting unavailable, searching with the original message: {}",
                    outcome.result.standalone_question
                ),
                None => format!(
                    "Standalone question: {} (needs context: {})",
                    outcome.result.standalone_question, outcome.result.needs_context
                ),
            };
            self.send(sink, StreamEvent::reasoning(note)).await?;
        }

        if let Some(answer) = outcome.result.direct_answer() {
            transition(state, PipelineState::DirectAnswer);
            self.send(sink, StreamEvent::content(answer)).await?;
            return Ok(PipelineState::DirectAnswer);
        }

        // Retrieving
        transition(state, PipelineState::Retrieving);
        let question = outcome.result.standalone_question.as_str();
        let knowledge = self
            .services
            .knowledge()
            .await
            .map_err(|cause| Interrupted::Failed {
                public: RETRIEVAL_FAILED,
                cause,
            })?;
        let request = retrieve::search_request(question, &config.knowledge);
        let documents = self
            .guard(
                sink,
                retrieve::retrieve(knowledge.as_ref(), &request, &config.retry.retrieval),
            )
            .await
            .map_err(|e| e.public(RETRIEVAL_FAILED))?;

        if emit_reasoning {
            let note = format!("Found {} relevant passages", documents.len());
            self.send(sink, StreamEvent::reasoning(note)).await?;
        }

        // Generating
        transition(state, PipelineState::Generating);
        let failed = |cause| Interrupted::Failed {
            public: GENERATION_FAILED,
            cause,
        };
        let history = messages.split_last().map(|(_, earlier)| earlier).unwrap_or(&[]);
        let prompt =
            build_answer_prompt(question, &documents, history, prompt_ctx).map_err(failed)?;
        let llm = self.services.llm().await.map_err(failed)?;

        let mut base = LlmRequest::new(prompt.user, &config.llm.model).with_streaming();
        if let Some(system) = prompt.system {
            base = base.with_system(system);
        }
        if let Some(temperature) = config.llm.temperature {
            base = base.with_temperature(temperature);
        }

        let mut degradation = Degradation::new(
            &config.llm.model,
            &config.llm.light_model,
            config.pipeline.degrade_after_failures,
        );
        let opened = self
            .guard(
                sink,
                generate::open_stream(llm.as_ref(), &base, &mut degradation, &config.retry.generation),
            )
            .await;

        if emit_reasoning && degradation.tier() == ModelTier::Light {
            let note = format!("Switched to the lighter model {}", degradation.current_model());
            self.send(sink, StreamEvent::reasoning(note)).await?;
        }

        let committed = opened.map_err(|e| e.public(GENERATION_FAILED))?;
        tracing::info!(model = %committed.model, "Streaming answer");

        let forwarding = generate::forward(committed, sink);
        match forwarding.await.map_err(failed)? {
            ForwardOutcome::Completed { chunks } => {
                tracing::debug!(chunks, "Answer streamed");
                Ok(PipelineState::Done)
            }
            ForwardOutcome::Disconnected => Err(Interrupted::Disconnected),
        }
    }

    /// Race a stage against caller disconnection and the stage deadline.
    async fn guard<T, F>(&self, sink: &EventSink, stage: F) -> Result<T, Interrupted>
    where
        F: Future<Output = orgchat_core::AppResult<T>>,
    {
        let deadline = self.services.config().pipeline.stage_timeout_secs;
        let bounded = async {
            if deadline == 0 {
                return stage.await;
            }
            match tokio::time::timeout(Duration::from_secs(deadline), stage).await {
                Ok(result) => result,
                Err(_) => Err(AppError::service(
                    "pipeline",
                    ServiceErrorKind::Timeout,
                    format!("stage exceeded its {}s deadline", deadline),
                )),
            }
        };

        tokio::select! {
            result = bounded => result.map_err(|cause| Interrupted::Failed { public: "", cause }),
            _ = sink.closed() => {
                tracing::info!("Caller disconnected, abandoning stage");
                Err(Interrupted::Disconnected)
            }
        }
    }

    async fn send(&self, sink: &EventSink, event: StreamEvent) -> Result<(), Interrupted> {
        if sink.send(event).await {
            Ok(())
        } else {
            Err(Interrupted::Disconnected)
        }
    }
}

impl Interrupted {
    fn public(self, public: &'static str) -> Self {
        match self {
            Interrupted::Failed { cause, .. } => Interrupted::Failed { public, cause },
            other => other,
        }
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    if *state != next {
        tracing::info!(from = %state, to = %next, "Pipeline state");
        *state = next;
    }
}

/// Run a pipeline inside a `chat` span tagged with `request_id`.
pub async fn run_request(
    pipeline: AnswerPipeline,
    request_id: String,
    messages: Vec<ConversationMessage>,
    sink: EventSink,
) -> PipelineState {
    let span = tracing::info_span!("chat", request_id = %request_id);
    pipeline.run(messages, sink).instrument(span).await
}

/// Synchronous checks done before streaming starts.
pub fn validate_messages(messages: &[ConversationMessage]) -> orgchat_core::AppResult<()> {
    if messages.is_empty() {
        return Err(AppError::InvalidRequest(
            "messages must contain at least one message".to_string(),
        ));
    }
    if orgchat_core::types::last_user_content(messages).is_none() {
        return Err(AppError::InvalidRequest(
            "the last message must have non-empty content".to_string(),
        ));
    }
    Ok(())
}
