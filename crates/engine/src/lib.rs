//! Query engine for docqa.
//!
//! Ties retrieval, prompt assembly, and streamed generation together behind
//! the facade the transport layer consumes, and owns the generation session
//! lifecycle (ordering, cancellation, truncation).

pub mod controller;
pub mod engine;
pub mod session;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use controller::{collect_answer, GenerationController};
pub use engine::{Answer, QueryEngine, QueryOutput, QueryRequest};
pub use session::{
    AnswerEvent, AnswerStream, FinishReason, SessionId, SessionInfo, SessionRegistry, SessionState,
};
