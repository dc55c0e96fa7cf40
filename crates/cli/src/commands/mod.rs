//! Command handlers for the docqa CLI.

pub mod ask;
pub mod ingest;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;

use std::sync::Arc;

use docqa_core::{AppConfig, RagResult};
use docqa_engine::QueryEngine;
use docqa_llm::OllamaClient;

/// Build the engine the way every command needs it: Ollama for generation,
/// everything else from configuration.
pub(crate) fn build_engine(config: &AppConfig) -> RagResult<QueryEngine> {
    let client = Arc::new(OllamaClient::with_base_url(&config.ollama_endpoint));
    QueryEngine::new(config.clone(), client)
}
