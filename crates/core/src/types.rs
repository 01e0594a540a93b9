//! Conversation data model shared by every crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single turn of the conversation. The ordered list of messages is the
/// request history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,

    pub content: String,

    /// Optional; clients that do not track time may omit it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: None,
        }
    }
}

/// Return the content of the last message if it carries non-blank text.
pub fn last_user_content(messages: &[ConversationMessage]) -> Option<&str> {
    messages
        .last()
        .map(|m| m.content.as_str())
        .filter(|content| !content.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        let msg: ConversationMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"Salut"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.timestamp.is_none());

        let json = serde_json::to_string(&ConversationMessage::user("Bonjour")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Bonjour"}"#);
    }

    #[test]
    fn test_timestamp_parsing() {
        let msg: ConversationMessage = serde_json::from_str(
            r#"{"role":"user","content":"Hi","timestamp":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(msg.timestamp.is_some());
    }

    #[test]
    fn test_last_user_content() {
        assert_eq!(last_user_content(&[]), None);
        assert_eq!(last_user_content(&[ConversationMessage::user("   ")]), None);
        assert_eq!(
            last_user_content(&[
                ConversationMessage::user("first"),
                ConversationMessage::assistant("reply"),
                ConversationMessage::user("second"),
            ]),
            Some("second")
        );
    }
}
