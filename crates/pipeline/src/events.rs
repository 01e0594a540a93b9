//! Output events and per-request pipeline states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a chunk belongs to the visible answer or to a reasoning trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    #[default]
    Content,
    Reasoning,
}

/// Unit of output sent to the caller.
///
/// A request produces an ordered sequence of events terminated by exactly
/// one event with `done == true` or `error` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: EventType,

    #[serde(default)]
    pub done: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamEvent {
    pub fn content(chunk: impl Into<String>) -> Self {
        Self {
            chunk: Some(chunk.into()),
            kind: EventType::Content,
            done: false,
            error: None,
        }
    }

    pub fn reasoning(chunk: impl Into<String>) -> Self {
        Self {
            chunk: Some(chunk.into()),
            kind: EventType::Reasoning,
            done: false,
            error: None,
        }
    }

    /// Successful end of the response.
    pub fn done() -> Self {
        Self {
            chunk: None,
            kind: EventType::Content,
            done: true,
            error: None,
        }
    }

    /// Failed end of the response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            chunk: None,
            kind: EventType::Content,
            done: false,
            error: Some(message.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }
}

/// Per-request state machine.
///
/// `Init -> Condensing -> {DirectAnswer | Retrieving -> Generating} -> Done`,
/// with `Error` reachable from `Retrieving` and `Generating`. `Cancelled`
/// marks a caller that went away; nothing more is emitted in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Condensing,
    DirectAnswer,
    Retrieving,
    Generating,
    Done,
    Error,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::DirectAnswer | Self::Done | Self::Error | Self::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Condensing => "condensing",
            Self::DirectAnswer => "direct_answer",
            Self::Retrieving => "retrieving",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&StreamEvent::content("Bonjour")).unwrap();
        assert_eq!(json, r#"{"chunk":"Bonjour","type":"content","done":false}"#);

        let json = serde_json::to_string(&StreamEvent::done()).unwrap();
        assert_eq!(json, r#"{"type":"content","done":true}"#);

        let json = serde_json::to_string(&StreamEvent::error("boom")).unwrap();
        assert_eq!(json, r#"{"type":"content","done":false,"error":"boom"}"#);

        let json = serde_json::to_string(&StreamEvent::reasoning("hmm")).unwrap();
        assert!(json.contains(r#""type":"reasoning""#));
    }

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::done().is_terminal());
        assert!(StreamEvent::error("x").is_terminal());
        assert!(!StreamEvent::content("x").is_terminal());
        assert!(!StreamEvent::reasoning("x").is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::DirectAnswer.is_terminal());
        assert!(PipelineState::Error.is_terminal());
        assert!(!PipelineState::Generating.is_terminal());
        assert_eq!(PipelineState::Retrieving.to_string(), "retrieving");
    }
}
