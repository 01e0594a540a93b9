//! Configuration management for orgchat.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`orgchat.yaml`, or the path in `ORGCHAT_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Later sources win.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::retry::RetryPolicy;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "orgchat.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Socket address the HTTP server binds to
    pub bind: String,

    /// Name of the organization questions are about by default
    pub organization: String,

    /// Language direct answers and generated answers are written in
    pub locale: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    pub llm: LlmSettings,

    pub knowledge: KnowledgeSettings,

    pub retry: RetryPolicies,

    pub pipeline: PipelineSettings,
}

/// Text-generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    /// Provider identifier ("ollama", "openai")
    pub provider: String,

    /// Base URL override
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Primary generation model
    pub model: String,

    /// Cheaper model used after degradation
    pub light_model: String,

    /// Model used for question rewriting
    pub condense_model: String,

    pub temperature: Option<f32>,

    /// HTTP timeout for a single call
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(), // Local-first default
            endpoint: None,
            api_key_env: None,
            model: "llama3.1:8b".to_string(),
            light_model: "llama3.2:3b".to_string(),
            condense_model: "llama3.2:3b".to_string(),
            temperature: Some(0.3),
            timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    /// Resolve the API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Knowledge retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KnowledgeSettings {
    /// "http" (remote knowledge service) or "memory" (local corpus)
    pub backend: String,

    /// Base URL of the remote knowledge service
    pub endpoint: Option<String>,

    /// JSON corpus loaded by the in-memory backend
    pub corpus_path: Option<PathBuf>,

    /// "trigram" (offline) or "ollama"
    pub embedding_provider: String,

    pub embedding_model: String,

    pub dimensions: usize,

    /// Number of documents returned
    pub k: usize,

    /// Candidate pool size before diversity re-ranking
    pub fetch_k: usize,

    /// Relevance/diversity trade-off; 1.0 is pure relevance
    pub lambda: f32,

    pub timeout_secs: u64,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            endpoint: None,
            corpus_path: None,
            embedding_provider: "trigram".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            dimensions: 384,
            k: 15,
            fetch_k: 30,
            lambda: 0.7,
            timeout_secs: 30,
        }
    }
}

/// One retry policy per category of external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicies {
    pub condense: RetryPolicy,
    pub retrieval: RetryPolicy,
    pub generation: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            condense: RetryPolicy {
                max_attempts: 3,
                initial_delay_ms: 500,
                max_delay_ms: 4_000,
                backoff_multiplier: 2.0,
            },
            retrieval: RetryPolicy {
                max_attempts: 3,
                initial_delay_ms: 500,
                max_delay_ms: 4_000,
                backoff_multiplier: 2.0,
            },
            generation: RetryPolicy {
                max_attempts: 5,
                initial_delay_ms: 1_000,
                max_delay_ms: 8_000,
                backoff_multiplier: 2.0,
            },
        }
    }
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineSettings {
    /// Consecutive generation failures before switching to the light model
    pub degrade_after_failures: u32,

    /// Emit reasoning events describing pipeline decisions
    pub emit_reasoning: bool,

    /// Deadline per stage; 0 disables it
    pub stage_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            degrade_after_failures: 2,
            emit_reasoning: false,
            stage_timeout_secs: 60,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            organization: "the organization".to_string(),
            locale: "fr".to_string(),
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: LlmSettings::default(),
            knowledge: KnowledgeSettings::default(),
            retry: RetryPolicies::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `ORGCHAT_CONFIG`: Path to config file
    /// - `ORGCHAT_BIND`: Server bind address
    /// - `ORGCHAT_PROVIDER`: LLM provider
    /// - `ORGCHAT_MODEL` / `ORGCHAT_LIGHT_MODEL`: Generation models
    /// - `ORGCHAT_LLM_ENDPOINT`: LLM base URL
    /// - `ORGCHAT_KNOWLEDGE_ENDPOINT`: Knowledge service base URL (selects the http backend)
    /// - `ORGCHAT_ORGANIZATION`, `ORGCHAT_LOCALE`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use orgchat_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Binding to {}", config.bind);
    /// ```
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let explicit = config_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ORGCHAT_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                Self::from_yaml_file(&path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_yaml_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a YAML config file. Missing keys fall back to defaults.
    pub fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Apply environment overrides through `lookup`, so tests can inject values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("ORGCHAT_BIND") {
            self.bind = bind;
        }
        if let Some(provider) = lookup("ORGCHAT_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = lookup("ORGCHAT_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = lookup("ORGCHAT_LIGHT_MODEL") {
            self.llm.light_model = model;
        }
        if let Some(endpoint) = lookup("ORGCHAT_LLM_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(endpoint) = lookup("ORGCHAT_KNOWLEDGE_ENDPOINT") {
            self.knowledge.backend = "http".to_string();
            self.knowledge.endpoint = Some(endpoint);
        }
        if let Some(organization) = lookup("ORGCHAT_ORGANIZATION") {
            self.organization = organization;
        }
        if let Some(locale) = lookup("ORGCHAT_LOCALE") {
            self.locale = locale;
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }
        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over the config file and environment.
    pub fn with_overrides(
        mut self,
        bind: Option<String>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(bind) = bind {
            self.bind = bind;
        }

        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate the configuration before any service is built.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["ollama", "openai"];
        if !known_providers.contains(&self.llm.provider.to_lowercase().as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.llm.provider,
                known_providers.join(", ")
            )));
        }

        match self.knowledge.backend.as_str() {
            "http" => {
                if self.knowledge.endpoint.is_none() {
                    return Err(AppError::Config(
                        "Knowledge backend 'http' requires an endpoint".to_string(),
                    ));
                }
            }
            "memory" => {}
            other => {
                return Err(AppError::Config(format!(
                    "Unknown knowledge backend: {}. Supported: http, memory",
                    other
                )))
            }
        }

        let k = &self.knowledge;
        if k.k == 0 || k.fetch_k < k.k {
            return Err(AppError::Config(format!(
                "Invalid retrieval sizes: k={} fetchK={} (need 0 < k <= fetchK)",
                k.k, k.fetch_k
            )));
        }
        if !(0.0..=1.0).contains(&k.lambda) {
            return Err(AppError::Config(format!(
                "Retrieval lambda must be within [0, 1], got {}",
                k.lambda
            )));
        }

        for (name, policy) in [
            ("condense", &self.retry.condense),
            ("retrieval", &self.retry.retrieval),
            ("generation", &self.retry.generation),
        ] {
            if policy.max_attempts == 0 {
                return Err(AppError::Config(format!(
                    "Retry policy '{}' needs at least one attempt",
                    name
                )));
            }
            if policy.backoff_multiplier < 1.0 {
                return Err(AppError::Config(format!(
                    "Retry policy '{}' has a backoff multiplier below 1",
                    name
                )));
            }
            if policy.initial_delay_ms > policy.max_delay_ms {
                return Err(AppError::Config(format!(
                    "Retry policy '{}' has an initial delay above its max delay",
                    name
                )));
            }
        }

        Ok(())
    }
}
