//! Condensation stage: rewrite the latest message into a standalone
//! question and decide whether it needs the knowledge base.
//!
//! This stage never fails the request. Any error, after retries, falls back
//! to the verbatim last message with `needs_context = true`.

use orgchat_core::{AppError, AppResult, ConversationMessage, RetryPolicy};
use orgchat_llm::{complete_json, LlmClient, LlmRequest};
use orgchat_prompt::{build_condense_prompt, PromptContext};
use serde::{Deserialize, Serialize};

/// Decision produced once per request by the condensation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CondensationResult {
    pub standalone_question: String,

    pub needs_context: bool,

    /// Only meaningful when `needs_context` is false
    #[serde(default)]
    pub direct_answer: Option<String>,
}

impl CondensationResult {
    /// Fail-open result: search with the original wording.
    pub fn fallback(last_message: &str) -> Self {
        Self {
            standalone_question: last_message.to_string(),
            needs_context: true,
            direct_answer: None,
        }
    }

    /// The direct answer, when the question can skip retrieval.
    pub fn direct_answer(&self) -> Option<&str> {
        if self.needs_context {
            return None;
        }
        self.direct_answer
            .as_deref()
            .filter(|answer| !answer.trim().is_empty())
    }

    /// Repair a model answer that is well-formed JSON but unusable.
    ///
    /// A blank question is replaced by the original message, and a "no
    /// context needed" verdict without an answer is turned into a search.
    fn sanitized(mut self, last_message: &str) -> Self {
        if self.standalone_question.trim().is_empty() {
            self.standalone_question = last_message.to_string();
        }
        if !self.needs_context && self.direct_answer().is_none() {
            self.needs_context = true;
        }
        if self.needs_context {
            self.direct_answer = None;
        }
        self
    }
}

/// Result of the stage, with the reason when the fallback was used.
#[derive(Debug, Clone, PartialEq)]
pub struct CondensationOutcome {
    pub result: CondensationResult,
    pub fallback_reason: Option<String>,
}

impl CondensationOutcome {
    pub fn used_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Inputs that stay fixed for the condensation call.
#[derive(Debug, Clone)]
pub struct CondenseOptions<'a> {
    pub model: &'a str,
    pub prompt: PromptContext<'a>,
    pub policy: &'a RetryPolicy,
}

/// Run the condensation stage.
///
/// `messages` must end with a non-blank message; the caller validates that
/// before streaming starts.
pub async fn condense(
    llm: &dyn LlmClient,
    messages: &[ConversationMessage],
    options: &CondenseOptions<'_>,
) -> CondensationOutcome {
    let last_message = messages
        .last()
        .map(|m| m.content.trim())
        .unwrap_or_default();

    match request_condensation(llm, messages, options).await {
        Ok(result) => CondensationOutcome {
            result: result.sanitized(last_message),
            fallback_reason: None,
        },
        Err(err) => fallback(last_message, &err),
    }
}

/// Fallback outcome for a failed (or timed out) condensation.
pub fn fallback(last_message: &str, err: &AppError) -> CondensationOutcome {
    tracing::warn!(error = %err, "Question rewriting failed, using the original message");
    CondensationOutcome {
        result: CondensationResult::fallback(last_message),
        fallback_reason: Some(err.to_string()),
    }
}

async fn request_condensation(
    llm: &dyn LlmClient,
    messages: &[ConversationMessage],
    options: &CondenseOptions<'_>,
) -> AppResult<CondensationResult> {
    let prompt = build_condense_prompt(messages, options.prompt)?;

    let mut request = LlmRequest::new(prompt.user, options.model)
        .with_json_output()
        .with_temperature(0.0);
    if let Some(system) = prompt.system {
        request = request.with_system(system);
    }

    let request = &request;
    options
        .policy
        .execute(
            move || complete_json::<CondensationResult>(llm, request),
            |attempt, err| {
                tracing::debug!(attempt, error = %err, "Condensation attempt failed");
            },
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_wire_format() {
        let result: CondensationResult = serde_json::from_str(
            r#"{"standaloneQuestion":"Bonjour","needsContext":false,"directAnswer":"Bonjour !"}"#,
        )
        .unwrap();
        assert_eq!(result.direct_answer(), Some("Bonjour !"));

        let result: CondensationResult =
            serde_json::from_str(r#"{"standaloneQuestion":"Quand ?","needsContext":true}"#).unwrap();
        assert!(result.direct_answer.is_none());
    }

    #[test]
    fn test_missing_field_does_not_parse() {
        assert!(serde_json::from_str::<CondensationResult>(r#"{"needsContext":true}"#).is_err());
    }

    #[test]
    fn test_sanitize_blank_question() {
        let result = CondensationResult {
            standalone_question: "  ".to_string(),
            needs_context: true,
            direct_answer: None,
        }
        .sanitized("Et le bal ?");
        assert_eq!(result.standalone_question, "Et le bal ?");
    }

    #[test]
    fn test_sanitize_missing_direct_answer_means_search() {
        let result = CondensationResult {
            standalone_question: "Qui est le trésorier ?".to_string(),
            needs_context: false,
            direct_answer: Some(" ".to_string()),
        }
        .sanitized("Qui est le trésorier ?");
        assert!(result.needs_context);
        assert!(result.direct_answer.is_none());
    }

    #[test]
    fn test_direct_answer_ignored_when_context_needed() {
        let result = CondensationResult {
            standalone_question: "q".to_string(),
            needs_context: true,
            direct_answer: Some("a".to_string()),
        };
        assert_eq!(result.direct_answer(), None);
        assert!(result.sanitized("q").direct_answer.is_none());
    }

    #[test]
    fn test_fallback_is_fail_open() {
        let err = AppError::Other("down".to_string());
        let outcome = fallback("Horaires ?", &err);
        assert!(outcome.used_fallback());
        assert!(outcome.result.needs_context);
        assert_eq!(outcome.result.standalone_question, "Horaires ?");
    }
}
