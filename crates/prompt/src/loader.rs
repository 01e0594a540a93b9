//! Loading of the built-in YAML prompt definitions.

use crate::types::PromptDefinition;
use orgchat_core::{AppError, AppResult};

/// Prompt that rewrites the latest message into a standalone question.
pub const CONDENSE_PROMPT_ID: &str = "chat.condense";

/// Prompt that answers a question from retrieved passages.
pub const ANSWER_PROMPT_ID: &str = "chat.answer";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (CONDENSE_PROMPT_ID, include_str!("../prompts/condense.yml")),
    (ANSWER_PROMPT_ID, include_str!("../prompts/answer.yml")),
];

/// Load a built-in prompt definition by ID.
pub fn load_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, source) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))?;

    let definition = parse_prompt(source)?;
    tracing::debug!("Loaded prompt: {} ({})", definition.id, definition.title);
    Ok(definition)
}

/// IDs of every built-in prompt.
pub fn list_prompts() -> Vec<&'static str> {
    BUILTIN_PROMPTS.iter().map(|(id, _)| *id).collect()
}

/// Parse and validate a YAML prompt definition.
pub fn parse_prompt(source: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(source)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML: {}", e)))?;

    validate_prompt(&definition)?;
    Ok(definition)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt template cannot be empty: {}",
            def.id
        )));
    }

    // Validate API version format (simple check)
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
