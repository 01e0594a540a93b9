//! Answer pipeline for orgchat.
//!
//! A request flows through three stages, each wrapped in the retry
//! controller from `orgchat-core`:
//! - **condense**: rewrite the last message into a standalone question and
//!   decide whether it needs the knowledge base (falls back, never fails)
//! - **retrieve**: diversity-aware search (fatal when exhausted)
//! - **generate**: stream the grounded answer, degrading to a lighter model
//!
//! Output is a sequence of [`StreamEvent`]s pushed into an [`EventSink`],
//! terminated by exactly one `done` or `error` event.

pub mod condense;
pub mod emitter;
pub mod events;
pub mod generate;
pub mod pipeline;
pub mod retrieve;
pub mod services;

pub use condense::{CondensationOutcome, CondensationResult};
pub use emitter::{channel, frame, frames, EventSink, DEFAULT_CHANNEL_CAPACITY, FRAME_DELIMITER};
pub use events::{EventType, PipelineState, StreamEvent};
pub use generate::{Degradation, ModelTier};
pub use pipeline::{run_request, validate_messages, AnswerPipeline};
pub use services::Services;
