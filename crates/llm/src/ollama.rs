//! Ollama generation backend.
//!
//! Talks to a local Ollama server via `/api/generate`. Streaming responses
//! are newline-delimited JSON; a network read may end mid-line, so partial
//! lines are carried over between reads.
//!
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk};
use docqa_core::{RagError, RagResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    stream: bool,
}

/// Ollama API response format (one object per NDJSON line when streaming).
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

/// Ollama generation client.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client against the default local endpoint.
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn to_ollama_request(&self, request: &LlmRequest, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            temperature: request.temperature,
            num_predict: request.max_tokens,
            stream,
        }
    }

    async fn send(&self, body: &OllamaRequest) -> RagResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to reach Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Generation(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_line(line: &str) -> RagResult<LlmStreamChunk> {
    let parsed: OllamaResponse = serde_json::from_str(line)
        .map_err(|e| RagError::Generation(format!("Failed to parse stream chunk: {}", e)))?;

    Ok(LlmStreamChunk {
        text: parsed.response,
        done: parsed.done,
    })
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> RagResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending completion request to Ollama");

        let body = self.to_ollama_request(request, false);
        let response = self.send(&body).await?;

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(LlmResponse {
            text: parsed.response,
            model: request.model.clone(),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> RagResult<LlmStream> {
        tracing::debug!(model = %request.model, "Starting streaming request to Ollama");

        let body = self.to_ollama_request(request, true);
        let response = self.send(&body).await?;

        let stream = response
            .bytes_stream()
            .map(|result| {
                result.map_err(|e| RagError::Generation(format!("Stream error: {}", e)))
            })
            .scan(String::new(), |buffer, result| {
                let items: Vec<RagResult<LlmStreamChunk>> = match result {
                    Err(e) => vec![Err(e)],
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));

                        let mut items = Vec::new();
                        while let Some(newline) = buffer.find('\n') {
                            let line = buffer[..newline].trim().to_string();
                            buffer.drain(..=newline);
                            if !line.is_empty() {
                                items.push(parse_line(&line));
                            }
                        }
                        items
                    }
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new();
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_request_conversion() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("Hello", "qwen2.5:1.5b").with_temperature(0.3);

        let body = client.to_ollama_request(&request, true);
        assert_eq!(body.model, "qwen2.5:1.5b");
        assert_eq!(body.prompt, "Hello");
        assert_eq!(body.temperature, Some(0.3));
        assert!(body.stream);
    }

    #[test]
    fn test_parse_stream_line() {
        let chunk =
            parse_line(r#"{"model":"qwen2.5:1.5b","response":"Hello","done":false}"#).unwrap();
        assert_eq!(chunk.text, "Hello");
        assert!(!chunk.done);

        let last = parse_line(r#"{"model":"qwen2.5:1.5b","response":"","done":true}"#).unwrap();
        assert!(last.done);
    }

    #[test]
    fn test_parse_malformed_line() {
        assert!(parse_line("not json").is_err());
    }
}
