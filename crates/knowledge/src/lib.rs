//! Knowledge retrieval for orgchat.
//!
//! The answer pipeline consumes a [`KnowledgeService`]: a diversity-aware
//! similarity search returning ranked passages about the organisation.
//! Two backends are provided: an HTTP client for an external knowledge
//! service, and an in-memory store that embeds a local JSON corpus and
//! ranks it with maximal marginal relevance.

pub mod embeddings;
pub mod factory;
pub mod memory;
pub mod mmr;
pub mod remote;
pub mod service;
pub mod types;


pub use embeddings::{create_provider, EmbeddingProvider};
pub use factory::create_service;
pub use memory::InMemoryKnowledgeStore;
pub use remote::HttpKnowledgeService;
pub use service::KnowledgeService;
pub use types::{LineRange, RetrievedDocument, SearchRequest, DEFAULT_FETCH_K, DEFAULT_K, DEFAULT_LAMBDA};
