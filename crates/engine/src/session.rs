//! Generation sessions.
//!
//! One `GenerationSession` tracks a single in-flight answer:
//! `Pending → Streaming → {Completed | Cancelled | Failed}`. The registry
//! owns the cancellation signal for each session; cancellation is
//! cooperative — the producer observes the flag between increments.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use docqa_core::{RagError, RagResult};

/// Identifier of one generation session.
pub type SessionId = Uuid;

/// Lifecycle state of a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, no model output yet
    Pending,
    /// First token received, increments flowing
    Streaming,
    /// Ended normally (including graceful truncation)
    Completed,
    /// Ended by a cancel call or consumer disconnect
    Cancelled,
    /// Ended by a model failure; emitted output is partial
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

/// Why a session's stream ended.
///
/// `Truncated` is a graceful completion (output budget reached), `Failed`
/// marks that the answer is partial — callers can always tell an incomplete
/// answer from a legitimate end-of-stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Complete,
    Truncated,
    Cancelled,
    Failed(String),
}

impl FinishReason {
    fn state(&self) -> SessionState {
        match self {
            FinishReason::Complete | FinishReason::Truncated => SessionState::Completed,
            FinishReason::Cancelled => SessionState::Cancelled,
            FinishReason::Failed(_) => SessionState::Failed,
        }
    }
}

/// One event on a session's answer stream.
///
/// Deltas arrive in strict FIFO order; exactly one `Done` terminates the
/// stream and nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerEvent {
    /// An increment of answer text
    Delta(String),
    /// End of stream with the reason
    Done(FinishReason),
}

/// A live answer stream handed to the caller.
pub struct AnswerStream {
    pub session_id: SessionId,
    pub events: mpsc::Receiver<AnswerEvent>,
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    pub emitted_chars: usize,
    pub finish: Option<FinishReason>,
}

struct SessionEntry {
    state: SessionState,
    emitted_chars: usize,
    finish: Option<FinishReason>,
    cancel_tx: watch::Sender<bool>,
}

/// Registry of all sessions in this process.
///
/// Sessions are transient: they live for the duration of a request and are
/// kept only for state inspection afterwards.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new `Pending` session; returns its id and cancel signal.
    pub(crate) fn create(&self) -> (SessionId, watch::Receiver<bool>) {
        let id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        self.sessions.lock().unwrap().insert(
            id,
            SessionEntry {
                state: SessionState::Pending,
                emitted_chars: 0,
                finish: None,
                cancel_tx,
            },
        );

        tracing::debug!(session = %id, "Created generation session");
        (id, cancel_rx)
    }

    /// Request cancellation of a session.
    ///
    /// Non-terminal sessions move to `Cancelled` and their producer stops
    /// within bounded time; cancelling a terminal session is a no-op.
    pub fn cancel(&self, id: SessionId) -> RagResult<()> {
        let mut sessions = self.sessions.lock().unwrap();
        let entry = sessions
            .get_mut(&id)
            .ok_or_else(|| RagError::UnknownSession(id.to_string()))?;

        if entry.state.is_terminal() {
            return Ok(());
        }

        entry.state = SessionState::Cancelled;
        let _ = entry.cancel_tx.send(true);

        tracing::info!(session = %id, "Cancellation requested");
        Ok(())
    }

    /// Record the first token: `Pending → Streaming`.
    pub(crate) fn mark_streaming(&self, id: SessionId) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.get_mut(&id) {
            if entry.state == SessionState::Pending {
                entry.state = SessionState::Streaming;
            }
        }
    }

    /// Add to a session's cumulative emitted length.
    pub(crate) fn add_emitted(&self, id: SessionId, chars: usize) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.get_mut(&id) {
            entry.emitted_chars += chars;
        }
    }

    /// Move a session to its terminal state.
    pub(crate) fn finish(&self, id: SessionId, reason: FinishReason) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.get_mut(&id) {
            if !entry.state.is_terminal() {
                entry.state = reason.state();
            }
            if entry.finish.is_none() {
                entry.finish = Some(reason);
            }
        }
    }

    /// Snapshot a session's state.
    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(&id).map(|entry| SessionInfo {
            id,
            state: entry.state,
            emitted_chars: entry.emitted_chars,
            finish: entry.finish.clone(),
        })
    }
}
