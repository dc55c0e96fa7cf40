//! Error types for docqa.
//!
//! One unified error enum covers every failure category in the pipeline.
//! Per-document ingestion problems are collected into reports rather than
//! propagated; everything else surfaces as a typed `RagError` so callers can
//! always tell "no results" apart from "subsystem down".

use thiserror::Error;

/// Unified error type for the docqa pipeline.
///
/// All fallible functions return `Result<T, RagError>`. We never panic in
/// library code; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration errors (startup-fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be ingested (per-document, non-fatal for the batch)
    #[error("Ingestion failure: {0}")]
    Ingestion(String),

    /// Embedding vector dimension does not match the store's fixed dimension.
    ///
    /// Signals a misconfigured embedding model against an existing store.
    /// Always fatal; never degraded into an empty result.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding model could not be reached.
    ///
    /// Distinct from an empty retrieval result: callers must be able to tell
    /// "no relevant documents" from "retrieval subsystem down".
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Vector store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Prompt template errors (startup-fatal)
    #[error("Template error: {0}")]
    Template(String),

    /// Generation model errors, including mid-stream failures
    #[error("Generation error: {0}")]
    Generation(String),

    /// A session id that is unknown or already torn down
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for RagError {
    fn from(err: serde_yaml::Error) -> Self {
        RagError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with RagError.
pub type RagResult<T> = Result<T, RagError>;
