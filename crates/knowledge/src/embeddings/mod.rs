//! Embedding providers used by the in-memory knowledge store.
//!
//! Two backends are available: a deterministic trigram hasher that needs no
//! network (default), and Ollama's `/api/embeddings` endpoint.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
