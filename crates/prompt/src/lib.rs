//! Prompt system for orgchat.
//!
//! Prompts are YAML definitions bundled with the crate, rendered with
//! Handlebars:
//! - `chat.condense`: rewrite the latest message into a standalone question
//!   and classify whether it needs the knowledge base (JSON output)
//! - `chat.answer`: answer from numbered, source-labelled passages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_answer_prompt, build_condense_prompt, build_prompt, PromptContext};
pub use loader::{list_prompts, load_prompt, ANSWER_PROMPT_ID, CONDENSE_PROMPT_ID};
pub use types::{BuiltPrompt, PromptDefinition, PromptOutputSpec};
