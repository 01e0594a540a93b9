//! Generation stage: stream the grounded answer, degrading to a lighter
//! model when the primary one keeps failing.
//!
//! Retries cover opening the stream and receiving its first chunk. Once a
//! chunk has been forwarded the attempt is committed: a later failure ends
//! the response with an error instead of restarting, so the caller never
//! sees a chunk twice.

use crate::emitter::EventSink;
use crate::events::StreamEvent;
use futures::StreamExt;
use orgchat_core::{AppError, AppResult, RetryPolicy};
use orgchat_llm::{ChunkKind, LlmClient, LlmRequest, LlmStream, LlmStreamChunk};

/// Which model a request is currently generating with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Light,
}

/// Explicit degradation state for one request.
///
/// The switch to the light model is one-way: it happens after
/// `threshold` consecutive failures, or at once on an exhausted quota.
#[derive(Debug, Clone)]
pub struct Degradation {
    primary: String,
    light: String,
    threshold: u32,
    tier: ModelTier,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl Degradation {
    pub fn new(primary: impl Into<String>, light: impl Into<String>, threshold: u32) -> Self {
        Self {
            primary: primary.into(),
            light: light.into(),
            threshold: threshold.max(1),
            tier: ModelTier::Primary,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    pub fn tier(&self) -> ModelTier {
        self.tier
    }

    pub fn current_model(&self) -> &str {
        match self.tier {
            ModelTier::Primary => &self.primary,
            ModelTier::Light => &self.light,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a failed attempt. Returns `true` when this failure caused the
    /// switch to the light model.
    pub fn record_failure(&mut self, err: &AppError) -> bool {
        self.consecutive_failures += 1;
        self.last_error = Some(err.to_string());

        if self.tier == ModelTier::Light {
            return false;
        }

        if err.is_quota_exceeded() || self.consecutive_failures >= self.threshold {
            self.tier = ModelTier::Light;
            return true;
        }
        false
    }
}

/// A generation stream whose first chunk has arrived.
pub struct CommittedStream {
    pub model: String,
    first: Option<LlmStreamChunk>,
    rest: LlmStream,
}

/// How forwarding ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    Completed { chunks: usize },
    Disconnected,
}

/// Open the stream with retries, threading `degradation` through attempts.
pub async fn open_stream(
    llm: &dyn LlmClient,
    base: &LlmRequest,
    degradation: &mut Degradation,
    policy: &RetryPolicy,
) -> AppResult<CommittedStream> {
    policy
        .execute_with_state(
            degradation,
            move |state: &Degradation| {
                let request = base.for_model(state.current_model());
                async move { start(llm, request).await }
            },
            |state, attempt, err| {
                let from = state.current_model().to_string();
                if state.record_failure(err) {
                    tracing::warn!(
                        attempt,
                        from = %from,
                        to = state.current_model(),
                        quota = err.is_quota_exceeded(),
                        "Degrading to lighter model"
                    );
                }
            },
        )
        .await
}

/// Open one stream and wait for its first non-empty chunk.
async fn start(llm: &dyn LlmClient, request: LlmRequest) -> AppResult<CommittedStream> {
    let mut stream = llm.stream(&request).await?;

    while let Some(item) = stream.next().await {
        let chunk = item?;
        if !chunk.content.is_empty() || chunk.done {
            let first = (!chunk.content.is_empty()).then_some(chunk);
            return Ok(CommittedStream {
                model: request.model,
                first,
                rest: stream,
            });
        }
    }

    // Ended without a single chunk: an empty but successful answer
    Ok(CommittedStream {
        model: request.model,
        first: None,
        rest: Box::pin(futures::stream::empty()),
    })
}

fn to_event(chunk: LlmStreamChunk) -> StreamEvent {
    match chunk.kind {
        ChunkKind::Content => StreamEvent::content(chunk.content),
        ChunkKind::Reasoning => StreamEvent::reasoning(chunk.content),
    }
}

/// Forward every chunk of a committed stream to the sink as it arrives.
///
/// A failure here is not retried; the caller ends the response with it.
/// Waiting on the model stops as soon as the caller goes away.
pub async fn forward(committed: CommittedStream, sink: &EventSink) -> AppResult<ForwardOutcome> {
    let CommittedStream {
        model,
        first,
        mut rest,
    } = committed;
    let mut chunks = 0usize;

    if let Some(chunk) = first {
        let done = chunk.done;
        if !sink.send(to_event(chunk)).await {
            return Ok(ForwardOutcome::Disconnected);
        }
        chunks += 1;
        if done {
            return Ok(ForwardOutcome::Completed { chunks });
        }
    }

    loop {
        let item = tokio::select! {
            item = rest.next() => item,
            _ = sink.closed() => {
                tracing::info!(model = %model, chunks, "Caller disconnected while the model was streaming");
                return Ok(ForwardOutcome::Disconnected);
            }
        };
        let Some(item) = item else { break };

        let chunk = item.map_err(|err| {
            tracing::error!(model = %model, chunks, error = %err, "Generation stream broke after commit");
            err
        })?;
        let done = chunk.done;

        if !chunk.content.is_empty() {
            if !sink.send(to_event(chunk)).await {
                return Ok(ForwardOutcome::Disconnected);
            }
            chunks += 1;
        }
        if done {
            break;
        }
    }

    tracing::debug!(model = %model, chunks, "Generation stream complete");
    Ok(ForwardOutcome::Completed { chunks })
}
