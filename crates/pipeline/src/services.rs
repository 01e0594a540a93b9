//! Process-wide service handles.
//!
//! The generation client and the knowledge backend are built lazily, once,
//! on first use, then shared by every request until the process exits.
//! Tests inject fakes with [`Services::with_clients`].

use orgchat_core::{AppConfig, AppResult};
use orgchat_knowledge::{create_service, KnowledgeService};
use orgchat_llm::{create_client, LlmClient, ProviderType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

pub struct Services {
    config: AppConfig,
    llm: OnceCell<Arc<dyn LlmClient>>,
    knowledge: OnceCell<Arc<dyn KnowledgeService>>,
}

impl Services {
    /// Services built from configuration on first use.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: OnceCell::new(),
            knowledge: OnceCell::new(),
        }
    }

    /// Services with pre-built clients.
    pub fn with_clients(
        config: AppConfig,
        llm: Arc<dyn LlmClient>,
        knowledge: Arc<dyn KnowledgeService>,
    ) -> Self {
        Self {
            config,
            llm: OnceCell::new_with(Some(llm)),
            knowledge: OnceCell::new_with(Some(knowledge)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The generation client. Concurrent first calls build it only once.
    pub async fn llm(&self) -> AppResult<Arc<dyn LlmClient>> {
        self.llm
            .get_or_try_init(|| async {
                let settings = &self.config.llm;
                let api_key = settings.resolve_api_key();
                let client = create_client(
                    &settings.provider,
                    settings.endpoint.as_deref(),
                    api_key.as_deref(),
                    Duration::from_secs(settings.timeout_secs),
                )?;
                tracing::info!(provider = client.provider_name(), "Generation client ready");
                Ok(client)
            })
            .await
            .cloned()
    }

    /// The knowledge backend. Concurrent first calls build it only once.
    pub async fn knowledge(&self) -> AppResult<Arc<dyn KnowledgeService>> {
        self.knowledge
            .get_or_try_init(|| async {
                let service =
                    create_service(&self.config.knowledge, self.embedding_endpoint()).await?;
                tracing::info!(backend = service.backend_name(), "Knowledge service ready");
                Ok(service)
            })
            .await
            .cloned()
    }

    /// Ollama base URL reused for embeddings when generation runs on Ollama.
    fn embedding_endpoint(&self) -> Option<&str> {
        match ProviderType::parse(&self.config.llm.provider) {
            Some(ProviderType::Ollama) => self.config.llm.endpoint.as_deref(),
            _ => None,
        }
    }
}
