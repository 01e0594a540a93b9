//! orgchat
//!
//! Streaming question-answering service for an organisation's members.
//! `serve` exposes the answer pipeline over HTTP; `ask` runs it once.

mod commands;
mod routes;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ServeCommand};
use orgchat_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// orgchat - grounded answers about your organisation, streamed
#[derive(Parser, Debug)]
#[command(name = "orgchat")]
#[command(about = "Grounded, streamed answers about your organisation", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "ORGCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "ORGCHAT_PROVIDER")]
    provider: Option<String>,

    /// Primary generation model
    #[arg(short, long, global = true, env = "ORGCHAT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the chat endpoint over HTTP
    Serve(ServeCommand),

    /// Answer one question and print the event frames
    Ask(AskCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, then config file, then environment
    let config = AppConfig::load(cli.config.as_deref())?;

    let bind = match &cli.command {
        Commands::Serve(cmd) => cmd.bind.clone(),
        Commands::Ask(_) => None,
    };

    // Apply CLI overrides
    let mut config = config.with_overrides(
        bind,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.log_json {
        config.log_json = true;
    }

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.log_json)?;

    config.validate()?;

    tracing::debug!("Provider: {}", config.llm.provider);
    tracing::debug!("Model: {} (light: {})", config.llm.model, config.llm.light_model);
    tracing::debug!("Knowledge backend: {}", config.knowledge.backend);

    let command_name = match &cli.command {
        Commands::Serve(_) => "serve",
        Commands::Ask(_) => "ask",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Serve(cmd) => cmd.execute(config).await,
        Commands::Ask(cmd) => cmd.execute(config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
