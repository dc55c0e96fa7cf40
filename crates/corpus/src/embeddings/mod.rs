//! Embedding providers.
//!
//! Wraps a local embedding model behind the `EmbeddingProvider` trait: text
//! in, fixed-dimension vector out. Two implementations ship: the Ollama
//! adapter (semantic, networked) and a deterministic trigram embedder
//! (offline, also the test double).

pub mod ollama;
pub mod trigram;

use std::sync::Arc;

use docqa_core::{AppConfig, RagError, RagResult};

pub use ollama::OllamaEmbedder;
pub use trigram::TrigramEmbedder;

/// Trait for embedding model adapters.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Provider name (e.g., "ollama", "trigram")
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;

    /// Fixed embedding dimension
    fn dimension(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>>;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| RagError::EmbeddingUnavailable("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from configuration.
pub fn create_provider(config: &AppConfig) -> RagResult<Arc<dyn EmbeddingProvider>> {
    match config.embedding_provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            &config.ollama_endpoint,
            &config.embedding_model,
            config.embedding_dim,
        )?)),

        "trigram" => Ok(Arc::new(TrigramEmbedder::new(config.embedding_dim))),

        other => Err(RagError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, trigram",
            other
        ))),
    }
}
