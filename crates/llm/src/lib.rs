//! Generation model integration for docqa.
//!
//! Provides the `LlmClient` trait plus the Ollama implementation used for
//! local answer generation.

pub mod client;
pub mod ollama;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk};
pub use ollama::OllamaClient;
