//! Scripted generation client for tests.

use std::time::Duration;

use docqa_core::{RagError, RagResult};
use docqa_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk};

/// An `LlmClient` that replays a fixed script.
///
/// `Ok` entries become stream increments, an `Err` entry becomes a mid-stream
/// failure. An optional per-item delay keeps a session observably mid-stream
/// for cancellation tests.
pub(crate) struct ScriptedClient {
    script: Vec<Result<String, String>>,
    delay: Option<Duration>,
    fail_request: Option<String>,
}

impl ScriptedClient {
    pub(crate) fn new(script: Vec<RagResult<String>>) -> Self {
        Self {
            script: script
                .into_iter()
                .map(|item| item.map_err(|e| e.to_string()))
                .collect(),
            delay: None,
            fail_request: None,
        }
    }

    pub(crate) fn with_tokens(tokens: &[&str]) -> Self {
        Self::new(tokens.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// A client whose `stream` call itself fails (model not reachable).
    pub(crate) fn failing_request(message: &str) -> Self {
        Self {
            script: Vec::new(),
            delay: None,
            fail_request: Some(message.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: &LlmRequest) -> RagResult<LlmResponse> {
        let mut text = String::new();
        for item in &self.script {
            match item {
                Ok(token) => text.push_str(token),
                Err(e) => return Err(RagError::Generation(e.clone())),
            }
        }
        Ok(LlmResponse {
            text,
            model: "scripted".to_string(),
        })
    }

    async fn stream(&self, _request: &LlmRequest) -> RagResult<LlmStream> {
        use futures::StreamExt;

        if let Some(message) = &self.fail_request {
            return Err(RagError::Generation(message.clone()));
        }

        let mut items: Vec<RagResult<LlmStreamChunk>> = self
            .script
            .iter()
            .map(|item| match item {
                Ok(token) => Ok(LlmStreamChunk {
                    text: token.clone(),
                    done: false,
                }),
                Err(e) => Err(RagError::Generation(e.clone())),
            })
            .collect();

        // A clean script ends with an empty done marker, like Ollama does.
        if !items.iter().any(|item| item.is_err()) {
            items.push(Ok(LlmStreamChunk {
                text: String::new(),
                done: true,
            }));
        }

        let delay = self.delay;
        let stream = futures::stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });

        Ok(Box::pin(stream))
    }
}
