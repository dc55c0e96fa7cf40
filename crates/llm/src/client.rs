//! Generation model client abstraction.
//!
//! Defines the request/response/stream types and the `LlmClient` trait that
//! the generation controller consumes. The only shipped implementation talks
//! to a local Ollama server; the trait keeps the controller testable with
//! scripted streams.

use docqa_core::RagResult;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A completion request for a local generation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The fully assembled prompt text
    pub prompt: String,

    /// Model identifier (e.g., "qwen2.5:1.5b")
    pub model: String,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// Create a new request with required fields.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A buffered (non-streaming) completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub text: String,

    /// Model that produced the response
    pub model: String,
}

/// One increment of a streaming completion.
///
/// `done` marks the final chunk; its `text` may be empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    /// Incremental text content
    pub text: String,

    /// Whether this is the final chunk of the stream
    pub done: bool,
}

/// Stream of completion increments, in model emission order.
pub type LlmStream = Pin<Box<dyn Stream<Item = RagResult<LlmStreamChunk>> + Send>>;

/// Trait for generation model backends.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Backend name (e.g., "ollama").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> RagResult<LlmResponse>;

    /// Perform a streaming completion.
    ///
    /// Increments arrive in emission order; the stream ends after the chunk
    /// with `done == true`, or with an `Err` item on mid-stream failure.
    async fn stream(&self, request: &LlmRequest) -> RagResult<LlmStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = LlmRequest::new("Hello", "qwen2.5:1.5b")
            .with_temperature(0.3)
            .with_max_tokens(256);

        assert_eq!(request.prompt, "Hello");
        assert_eq!(request.model, "qwen2.5:1.5b");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(256));
    }
}
