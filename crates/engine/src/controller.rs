//! Generation controller.
//!
//! Drives one streaming completion per session: a producer task pumps the
//! model stream into a bounded channel (backpressure comes from the channel,
//! nothing else buffers), preserving arrival order, enforcing the output
//! length cap, and observing the cancellation flag between increments — and
//! while blocked on a slow consumer, so cancellation latency stays bounded.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use docqa_core::RagResult;
use docqa_llm::{LlmClient, LlmRequest};
use docqa_prompt::PromptContext;

use crate::session::{AnswerEvent, AnswerStream, FinishReason, SessionId, SessionRegistry};

/// Bound of the per-session event channel. Small on purpose: a slow consumer
/// stalls the producer instead of growing a buffer.
const CHANNEL_CAPACITY: usize = 32;

/// Why a delta could not be delivered.
enum SendStop {
    /// Cancellation was signalled while waiting to send.
    Cancelled,
    /// The consumer dropped its receiver.
    Disconnected,
}

/// Controls streamed answer generation.
pub struct GenerationController {
    client: Arc<dyn LlmClient>,
    registry: Arc<SessionRegistry>,
    model: String,
    temperature: f32,
    max_output_chars: usize,
}

impl GenerationController {
    pub fn new(
        client: Arc<dyn LlmClient>,
        registry: Arc<SessionRegistry>,
        model: impl Into<String>,
        temperature: f32,
        max_output_chars: usize,
    ) -> Self {
        Self {
            client,
            registry,
            model: model.into(),
            temperature,
            max_output_chars,
        }
    }

    /// Start generating an answer for the assembled prompt.
    ///
    /// Returns immediately with a `Pending` session; the stream delivers
    /// deltas in model order and terminates with exactly one `Done`.
    pub fn start(&self, prompt: PromptContext) -> AnswerStream {
        let (session_id, cancel_rx) = self.registry.create();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let request =
            LlmRequest::new(prompt.text, self.model.clone()).with_temperature(self.temperature);
        let max_output_chars = self.max_output_chars;

        tokio::spawn(async move {
            run_session(
                client,
                registry,
                request,
                session_id,
                cancel_rx,
                tx,
                max_output_chars,
            )
            .await;
        });

        AnswerStream {
            session_id,
            events: rx,
        }
    }

    /// Produce a session that streams a fixed message and completes.
    ///
    /// Used for configured refusals, so callers see one uniform stream shape
    /// whether or not the model was invoked.
    pub fn start_canned(&self, message: String) -> AnswerStream {
        let (session_id, _cancel_rx) = self.registry.create();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let registry = Arc::clone(&self.registry);
        let chars = message.chars().count();

        tokio::spawn(async move {
            registry.mark_streaming(session_id);
            registry.add_emitted(session_id, chars);
            let _ = tx.send(AnswerEvent::Delta(message)).await;
            finish(&registry, session_id, &tx, FinishReason::Complete).await;
        });

        AnswerStream {
            session_id,
            events: rx,
        }
    }
}

/// The producer loop for one session.
#[allow(clippy::too_many_arguments)]
async fn run_session(
    client: Arc<dyn LlmClient>,
    registry: Arc<SessionRegistry>,
    request: LlmRequest,
    session_id: SessionId,
    mut cancel_rx: watch::Receiver<bool>,
    tx: mpsc::Sender<AnswerEvent>,
    max_output_chars: usize,
) {
    use futures::StreamExt;

    let mut stream = match client.stream(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(session = %session_id, "Generation request failed: {}", e);
            finish(&registry, session_id, &tx, FinishReason::Failed(e.to_string())).await;
            return;
        }
    };

    let mut emitted_chars = 0usize;

    loop {
        let item = tokio::select! {
            // Cancellation wins over a ready increment.
            biased;

            _ = cancel_rx.changed() => {
                tracing::debug!(session = %session_id, "Producer observed cancellation");
                finish(&registry, session_id, &tx, FinishReason::Cancelled).await;
                return;
            }

            item = stream.next() => item,
        };

        match item {
            None => {
                finish(&registry, session_id, &tx, FinishReason::Complete).await;
                return;
            }
            Some(Err(e)) => {
                tracing::warn!(session = %session_id, "Generation failed mid-stream: {}", e);
                finish(&registry, session_id, &tx, FinishReason::Failed(e.to_string())).await;
                return;
            }
            Some(Ok(chunk)) => {
                if !chunk.text.is_empty() {
                    registry.mark_streaming(session_id);

                    let available = max_output_chars - emitted_chars;
                    let delta_chars = chunk.text.chars().count();
                    let truncating = delta_chars > available;

                    let delta: String = if truncating {
                        chunk.text.chars().take(available).collect()
                    } else {
                        chunk.text
                    };
                    let delta_chars = delta_chars.min(available);

                    if !delta.is_empty() {
                        match send_delta(&tx, &mut cancel_rx, delta).await {
                            Ok(()) => {
                                emitted_chars += delta_chars;
                                registry.add_emitted(session_id, delta_chars);
                            }
                            Err(SendStop::Cancelled) => {
                                tracing::debug!(session = %session_id, "Cancelled while sending");
                                finish(&registry, session_id, &tx, FinishReason::Cancelled).await;
                                return;
                            }
                            Err(SendStop::Disconnected) => {
                                // Consumer hung up; stop pulling from the model.
                                tracing::debug!(session = %session_id, "Consumer disconnected");
                                registry.finish(session_id, FinishReason::Cancelled);
                                return;
                            }
                        }
                    }

                    if truncating {
                        tracing::info!(
                            session = %session_id,
                            max_output_chars,
                            "Output budget reached, truncating"
                        );
                        finish(&registry, session_id, &tx, FinishReason::Truncated).await;
                        return;
                    }
                }

                if chunk.done {
                    finish(&registry, session_id, &tx, FinishReason::Complete).await;
                    return;
                }
            }
        }
    }
}

/// Send one delta, still watching the cancellation flag so a full channel
/// cannot stall shutdown.
async fn send_delta(
    tx: &mpsc::Sender<AnswerEvent>,
    cancel_rx: &mut watch::Receiver<bool>,
    delta: String,
) -> Result<(), SendStop> {
    tokio::select! {
        biased;

        _ = cancel_rx.changed() => Err(SendStop::Cancelled),

        sent = tx.send(AnswerEvent::Delta(delta)) => {
            sent.map_err(|_| SendStop::Disconnected)
        }
    }
}

/// Send the terminal event and record the state transition.
async fn finish(
    registry: &SessionRegistry,
    session_id: SessionId,
    tx: &mpsc::Sender<AnswerEvent>,
    reason: FinishReason,
) {
    registry.finish(session_id, reason.clone());
    let _ = tx.send(AnswerEvent::Done(reason)).await;
}

/// Drain a stream into the final answer text and finish reason.
///
/// Concatenating deltas in delivery order reproduces the cumulative output,
/// which is exactly what buffered callers want.
pub async fn collect_answer(stream: &mut AnswerStream) -> RagResult<(String, FinishReason)> {
    let mut text = String::new();

    while let Some(event) = stream.events.recv().await {
        match event {
            AnswerEvent::Delta(delta) => text.push_str(&delta),
            AnswerEvent::Done(reason) => return Ok((text, reason)),
        }
    }

    // The producer always terminates the stream with Done; a closed channel
    // without one means the producer died.
    Err(docqa_core::RagError::Generation(
        "Answer stream ended without a terminal event".to_string(),
    ))
}
