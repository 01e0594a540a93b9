//! LLM integration crate for orgchat.
//!
//! This crate provides a provider-agnostic abstraction for interacting with
//! Large Language Models (LLMs). It supports multiple providers through a
//! unified trait-based interface, and classifies every transport failure into
//! a [`orgchat_core::ServiceErrorKind`].
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: any `/chat/completions` server
//!
//! # Example
//! ```no_run
//! use orgchat_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.1:8b");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod errors;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{
    complete_json, parse_json_content, ChunkKind, LlmClient, LlmRequest, LlmResponse, LlmStream,
    LlmStreamChunk, LlmUsage,
};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
