//! Corpus type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source document tracked by the store.
///
/// The id is the normalized origin path, so re-ingesting the same source
/// addresses the same record. The content hash decides whether a re-ingest
/// is a no-op or supersedes the prior chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document identifier (normalized origin path)
    pub id: String,

    /// Origin path or identifier as given by the caller
    pub origin: String,

    /// SHA-256 hash of the raw text, hex-encoded
    pub content_hash: String,

    /// When this document was (last) ingested
    pub ingested_at: DateTime<Utc>,

    /// Number of chunks currently stored for this document
    pub chunk_count: u32,
}

/// A contiguous slice of a document, stored with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier
    pub id: String,

    /// Parent document id
    pub document_id: String,

    /// Position within the document (0-indexed)
    pub ordinal: u32,

    /// Chunk text content
    pub text: String,

    /// Byte span in the original document text
    pub span: (usize, usize),

    /// Embedding vector
    pub embedding: Vec<f32>,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Result of a retrieval: chunks in descending score order, at most k.
///
/// Transient; produced per query and never persisted. Empty means "nothing
/// relevant" — a retrieval subsystem failure is an error, never an empty
/// result.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Highest similarity score, if any hits exist.
    pub fn top_score(&self) -> Option<f32> {
        self.hits.first().map(|hit| hit.score)
    }
}

/// The outcome of ingesting a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The document was chunked, embedded, and written to the store.
    Ingested { chunks: u32 },
    /// The content hash matched the stored one; nothing was written.
    Unchanged,
    /// The document was empty (or whitespace only) and was skipped.
    SkippedEmpty,
}

/// A per-document ingestion failure.
///
/// Collected into the report; one failing document never aborts the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    /// Origin of the failing document
    pub origin: String,

    /// Why it failed
    pub reason: String,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents whose chunks were (re)written
    pub documents_ingested: u32,

    /// Documents skipped because their content hash was unchanged
    pub documents_unchanged: u32,

    /// Documents skipped because they were empty
    pub documents_skipped: u32,

    /// Total chunks created across all ingested documents
    pub chunks_created: u32,

    /// Per-document failures
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// Total documents the run looked at.
    pub fn documents_seen(&self) -> u32 {
        self.documents_ingested
            + self.documents_unchanged
            + self.documents_skipped
            + self.failures.len() as u32
    }

    pub fn record(&mut self, outcome: &DocumentOutcome) {
        match outcome {
            DocumentOutcome::Ingested { chunks } => {
                self.documents_ingested += 1;
                self.chunks_created += chunks;
            }
            DocumentOutcome::Unchanged => self.documents_unchanged += 1,
            DocumentOutcome::SkippedEmpty => self.documents_skipped += 1,
        }
    }
}

/// Store-level counts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StoreStats {
    pub documents: u32,
    pub chunks: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_record() {
        let mut report = IngestReport::default();
        report.record(&DocumentOutcome::Ingested { chunks: 4 });
        report.record(&DocumentOutcome::Unchanged);
        report.record(&DocumentOutcome::SkippedEmpty);

        assert_eq!(report.documents_ingested, 1);
        assert_eq!(report.documents_unchanged, 1);
        assert_eq!(report.documents_skipped, 1);
        assert_eq!(report.chunks_created, 4);
        assert_eq!(report.documents_seen(), 3);
    }

    #[test]
    fn test_retrieval_result_top_score() {
        let result = RetrievalResult::default();
        assert!(result.is_empty());
        assert_eq!(result.top_score(), None);
    }
}
