//! Document ingestion pipeline.
//!
//! Reads raw documents, splits them with the chunk policy, embeds the chunks
//! in batches, and writes them to the vector store. This is the only write
//! path into the store.
//!
//! Ingestion is idempotent: the document id is the normalized origin path and
//! a SHA-256 content hash decides whether anything changed. A changed hash
//! replaces all prior chunks for that document in one store transaction.
//! Failures are isolated per document and collected into the report.

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use docqa_core::{RagError, RagResult};

use crate::chunker::ChunkPolicy;
use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::{Chunk, DocumentOutcome, DocumentRecord, IngestFailure, IngestReport};

/// How many chunk texts to embed per provider call.
const EMBED_BATCH_SIZE: usize = 32;

/// File extensions accepted as ingestable text.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

/// Ingestion pipeline over a shared store and embedding provider.
pub struct IngestionPipeline {
    store: Arc<Mutex<VectorStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
    policy: ChunkPolicy,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<Mutex<VectorStore>>,
        embedder: Arc<dyn EmbeddingProvider>,
        policy: ChunkPolicy,
    ) -> Self {
        Self {
            store,
            embedder,
            policy,
        }
    }

    /// Ingest a file or a directory tree of text files.
    ///
    /// One failing document never aborts the batch; its failure is recorded
    /// in the report instead. A `DimensionMismatch` is the exception: it
    /// means the embedding model does not match the store and the whole run
    /// stops.
    pub async fn ingest_path(&self, path: &Path) -> RagResult<IngestReport> {
        let mut report = IngestReport::default();

        if path.is_file() {
            self.ingest_file(path, &mut report).await?;
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && is_text_file(entry_path) {
                    self.ingest_file(entry_path, &mut report).await?;
                }
            }
        } else {
            return Err(RagError::Ingestion(format!(
                "Path does not exist: {:?}",
                path
            )));
        }

        if report.documents_seen() == 0 {
            tracing::warn!("No ingestable documents found under {:?}", path);
        }

        tracing::info!(
            ingested = report.documents_ingested,
            unchanged = report.documents_unchanged,
            skipped = report.documents_skipped,
            chunks = report.chunks_created,
            failures = report.failures.len(),
            "Ingestion run finished"
        );

        Ok(report)
    }

    async fn ingest_file(&self, path: &Path, report: &mut IngestReport) -> RagResult<()> {
        let origin = normalize_origin(path);

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                report.failures.push(IngestFailure {
                    origin,
                    reason: format!("Failed to read file: {}", e),
                });
                return Ok(());
            }
        };

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                report.failures.push(IngestFailure {
                    origin,
                    reason: format!("Not valid UTF-8: {}", e),
                });
                return Ok(());
            }
        };

        match self.ingest_document(&origin, &text).await {
            Ok(outcome) => {
                report.record(&outcome);
                Ok(())
            }
            // Misconfigured embedding model vs. store: stop the whole run.
            Err(e @ RagError::DimensionMismatch { .. }) => Err(e),
            Err(e) => {
                report.failures.push(IngestFailure {
                    origin,
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    /// Ingest one document given its origin identifier and raw text.
    ///
    /// Unchanged content (by hash) is a no-op. Changed content replaces all
    /// prior chunks for the document id atomically.
    pub async fn ingest_document(&self, origin: &str, text: &str) -> RagResult<DocumentOutcome> {
        if text.trim().is_empty() {
            tracing::warn!(document = %origin, "Skipping empty document");
            return Ok(DocumentOutcome::SkippedEmpty);
        }

        let content_hash = hash_text(text);

        {
            let store = self.store.lock().await;
            if store.document_hash(origin)?.as_deref() == Some(content_hash.as_str()) {
                tracing::debug!(document = %origin, "Content unchanged, skipping");
                return Ok(DocumentOutcome::Unchanged);
            }
        }

        let spans = self.policy.split(text);
        if spans.is_empty() {
            tracing::warn!(document = %origin, "Document produced no chunks");
            return Ok(DocumentOutcome::SkippedEmpty);
        }

        // Embed in batches for throughput; chunk order is preserved.
        let mut embeddings = Vec::with_capacity(spans.len());
        let texts: Vec<String> = spans.iter().map(|span| span.text.clone()).collect();
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            embeddings.extend(self.embedder.embed_batch(batch).await?);
        }

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(ordinal, (span, embedding))| Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                document_id: origin.to_string(),
                ordinal: ordinal as u32,
                text: span.text,
                span: (span.start, span.end),
                embedding,
            })
            .collect();

        let record = DocumentRecord {
            id: origin.to_string(),
            origin: origin.to_string(),
            content_hash,
            ingested_at: chrono::Utc::now(),
            chunk_count: chunks.len() as u32,
        };

        let chunk_count = chunks.len() as u32;
        self.store
            .lock()
            .await
            .replace_document(&record, &chunks)?;

        tracing::debug!(document = %origin, chunks = chunk_count, "Ingested document");

        Ok(DocumentOutcome::Ingested {
            chunks: chunk_count,
        })
    }
}

/// SHA-256 of the raw text, hex-encoded.
fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Document id: the origin path with forward slashes.
fn normalize_origin(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
