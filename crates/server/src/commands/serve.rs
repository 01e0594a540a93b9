//! Serve command handler.

use crate::routes;
use clap::Args;
use orgchat_core::{config::AppConfig, AppError, AppResult};
use orgchat_pipeline::{AnswerPipeline, Services};
use std::sync::Arc;

/// Serve the chat endpoint over HTTP
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (overrides config `bind`)
    #[arg(short, long, env = "ORGCHAT_BIND")]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: AppConfig) -> AppResult<()> {
        let bind = config.bind.clone();
        let services = Arc::new(Services::new(config));
        let app = routes::router(AnswerPipeline::new(services));

        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| AppError::Config(format!("Cannot listen on {}: {}", bind, e)))?;
        tracing::info!("Listening on http://{}", bind);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
