//! docqa CLI
//!
//! Thin driver around the query engine: ingest a corpus, ask questions with
//! streamed answers, inspect store statistics. All pipeline logic lives in
//! the library crates.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, StatsCommand};
use docqa_core::{logging, AppConfig, RagResult};
use std::path::PathBuf;

/// Question answering over a local document corpus
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Question answering over a local document corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./docqa.yaml if present)
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
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

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest documents into the corpus
    Ingest(IngestCommand),

    /// Ask a question against the corpus
    Ask(AskCommand),

    /// Show corpus statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> RagResult<()> {
    let cli = Cli::parse();

    if let Some(ref path) = cli.config {
        std::env::set_var("DOCQA_CONFIG", path);
    }

    let mut config = AppConfig::load()?;

    if let Some(level) = cli.log_level {
        config.log_level = Some(level);
    }
    if cli.verbose && config.log_level.is_none() {
        config.log_level = Some("debug".to_string());
    }
    if cli.no_color {
        config.no_color = true;
    }

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("docqa starting");
    tracing::debug!("Store: {:?}", config.store_path);
    tracing::debug!("Embedding model: {}", config.embedding_model);
    tracing::debug!("Generation model: {}", config.generation_model);

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
