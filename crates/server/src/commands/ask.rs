//! Ask command handler.
//!
//! Runs the full pipeline for one question and writes the framed events to
//! stdout as they arrive, exactly as the HTTP endpoint would send them.

use clap::Args;
use orgchat_core::{config::AppConfig, AppError, AppResult, ConversationMessage};
use orgchat_pipeline::{
    channel, frame, run_request, validate_messages, AnswerPipeline, EventType, PipelineState,
    Services, DEFAULT_CHANNEL_CAPACITY,
};
use std::io::Write;
use std::sync::Arc;

/// Answer one question and print the event frames
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Print only the answer text instead of raw frames
    #[arg(long)]
    pub text: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        let messages = vec![ConversationMessage::user(self.question.as_str())];
        validate_messages(&messages)?;

        let pipeline = AnswerPipeline::new(Arc::new(Services::new(config)));
        let (sink, mut rx) = channel(DEFAULT_CHANNEL_CAPACITY);
        let request_id = uuid::Uuid::new_v4().to_string();
        let run = tokio::spawn(run_request(pipeline, request_id, messages, sink));

        let mut stdout = std::io::stdout();
        let mut failure = None;

        while let Some(event) = rx.recv().await {
            if self.text {
                if event.kind == EventType::Content {
                    if let Some(chunk) = &event.chunk {
                        write!(stdout, "{}", chunk)?;
                    }
                }
                if event.done {
                    writeln!(stdout)?;
                }
            } else {
                write!(stdout, "{}", frame(&event))?;
            }
            stdout.flush()?;

            if let Some(error) = event.error {
                failure = Some(error);
            }
        }

        let state = run
            .await
            .map_err(|e| AppError::Other(format!("Pipeline task failed: {}", e)))?;

        match (state, failure) {
            (PipelineState::Error, Some(error)) => Err(AppError::Other(error)),
            _ => Ok(()),
        }
    }
}
