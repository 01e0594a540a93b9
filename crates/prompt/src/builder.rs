//! Prompt builder for rendering templates and injecting context.

use crate::loader::{load_prompt, ANSWER_PROMPT_ID, CONDENSE_PROMPT_ID};
use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use orgchat_core::types::Role;
use orgchat_core::{AppError, AppResult, ConversationMessage};
use orgchat_knowledge::{LineRange, RetrievedDocument};
use serde::Serialize;
use serde_json::json;

/// Who the assistant speaks for, and in which language.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub organization: &'a str,
    pub locale: &'a str,
}

#[derive(Serialize)]
struct HistoryLine<'a> {
    speaker: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceBlock<'a> {
    index: usize,
    source_type: &'a str,
    source_id: &'a str,
    line_range: Option<LineRange>,
    content: &'a str,
}

fn history_lines(messages: &[ConversationMessage]) -> Vec<HistoryLine<'_>> {
    messages
        .iter()
        .map(|m| HistoryLine {
            speaker: match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            },
            content: m.content.trim(),
        })
        .collect()
}

/// Build the rewriting prompt from the full message history.
///
/// The last message is the one to rewrite; everything before it is the
/// conversation used to resolve references.
pub fn build_condense_prompt(
    messages: &[ConversationMessage],
    ctx: PromptContext<'_>,
) -> AppResult<BuiltPrompt> {
    let (last, earlier) = messages
        .split_last()
        .ok_or_else(|| AppError::InvalidRequest("No message to rewrite".to_string()))?;

    let data = json!({
        "organization": ctx.organization,
        "locale": ctx.locale,
        "history": history_lines(earlier),
        "question": last.content.trim(),
    });

    build_prompt(&load_prompt(CONDENSE_PROMPT_ID)?, &data)
}

/// Build the final answer prompt.
///
/// `history` is the conversation before the current question; the
/// standalone question replaces the raw last message.
pub fn build_answer_prompt(
    question: &str,
    documents: &[RetrievedDocument],
    history: &[ConversationMessage],
    ctx: PromptContext<'_>,
) -> AppResult<BuiltPrompt> {
    let sources: Vec<SourceBlock<'_>> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| SourceBlock {
            index: i + 1,
            source_type: &doc.source_type,
            source_id: &doc.source_id,
            line_range: doc.line_range,
            content: doc.content.trim(),
        })
        .collect();

    let data = json!({
        "organization": ctx.organization,
        "locale": ctx.locale,
        "documents": sources,
        "history": history_lines(history),
        "question": question.trim(),
    });

    build_prompt(&load_prompt(ANSWER_PROMPT_ID)?, &data)
}

/// Render a definition's system and user templates with the same data.
pub fn build_prompt(definition: &PromptDefinition, data: &impl Serialize) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, data))
        .transpose()?;
    let user = render_template(&definition.template, data)?;

    Ok(BuiltPrompt {
        system,
        user,
        source_prompt_id: definition.id.clone(),
        json_output: definition.output.is_json(),
    })
}

/// Render a Handlebars template.
fn render_template(template: &str, data: &impl Serialize) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: PromptContext<'static> = PromptContext {
        organization: "Amicale des Pompiers de Lyon",
        locale: "fr",
    };

    #[test]
    fn test_condense_prompt_contents() {
        let messages = vec![
            ConversationMessage::user("Quand a lieu le bal ?"),
            ConversationMessage::assistant("Le bal a lieu le 14 juillet."),
            ConversationMessage::user("Et il coûte combien ?"),
        ];

        let built = build_condense_prompt(&messages, CTX).unwrap();
        let system = built.system.unwrap();

        assert!(built.json_output);
        assert_eq!(built.source_prompt_id, "chat.condense");
        assert!(system.contains("Amicale des Pompiers de Lyon"));
        assert!(system.contains("\"fr\""));
        assert!(system.contains("standaloneQuestion"));
        assert!(built.user.contains("Assistant: Le bal a lieu le 14 juillet."));
        assert!(built.user.ends_with("Et il coûte combien ?"));
    }

    #[test]
    fn test_condense_prompt_without_history() {
        let built = build_condense_prompt(&[ConversationMessage::user("Bonjour")], CTX).unwrap();
        assert!(!built.user.contains("Conversation so far"));
        assert!(built.user.contains("Bonjour"));
    }

    #[test]
    fn test_condense_prompt_requires_a_message() {
        assert!(matches!(
            build_condense_prompt(&[], CTX),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_answer_prompt_labels_sources() {
        let docs = vec![
            RetrievedDocument::new("Cotisation : 30 euros par an.", "reglement.md", "file")
                .with_lines(12, 14),
            RetrievedDocument::new("Assemblée générale le 3 mars.", "ev-7", "event"),
        ];

        let built = build_answer_prompt("Combien coûte la cotisation ?", &docs, &[], CTX).unwrap();
        let system = built.system.unwrap();

        assert!(!built.json_output);
        assert!(system.contains("[1] (file reglement.md, lines 12-14)"));
        assert!(system.contains("[2] (event ev-7)"));
        assert!(system.contains("Cotisation : 30 euros par an."));
        assert!(!system.contains("(none)"));
        assert!(built.user.contains("Question: Combien coûte la cotisation ?"));
    }

    #[test]
    fn test_answer_prompt_without_documents() {
        let history = vec![ConversationMessage::user("Salut"), ConversationMessage::assistant("Bonjour !")];
        let built = build_answer_prompt("Qui est le président ?", &[], &history, CTX).unwrap();

        assert!(built.system.unwrap().contains("(none)"));
        assert!(built.user.contains("User: Salut"));
    }

    #[test]
    fn test_no_html_escaping() {
        let docs = vec![RetrievedDocument::new("Tarifs <adhérents> & invités", "a1", "article")];
        let built = build_answer_prompt("Tarifs ?", &docs, &[], CTX).unwrap();
        assert!(built.system.unwrap().contains("Tarifs <adhérents> & invités"));
    }
}
