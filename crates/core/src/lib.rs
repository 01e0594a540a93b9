//! Orgchat Core Library
//!
//! This crate provides the foundational utilities shared by every orgchat crate:
//! - Error handling (`AppError`, `AppResult`, `ServiceErrorKind`)
//! - Logging infrastructure
//! - Configuration management
//! - The conversation data model
//! - The exponential-backoff retry controller

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult, ServiceErrorKind};
pub use retry::RetryPolicy;
pub use types::{ConversationMessage, Role};
