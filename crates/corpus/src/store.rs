//! SQLite-backed vector store.
//!
//! Persists (embedding, chunk text, provenance) triples keyed by document,
//! and answers nearest-neighbor queries with a full-scan cosine similarity
//! ranking. The embedding dimension is recorded in a `meta` table so a store
//! built with one embedding model cannot be silently reused with another.
//!
//! All writes for one document happen inside a single transaction: a reader
//! observes either the pre-replace or post-replace chunk set, never a mix.

use rusqlite::{params, Connection};
use std::path::Path;

use docqa_core::{RagError, RagResult};

use crate::types::{Chunk, DocumentRecord, ScoredChunk, StoreStats};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    origin TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    ingested_at TEXT NOT NULL,
    chunk_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id),
    ordinal INTEGER NOT NULL,
    text TEXT NOT NULL,
    span_start INTEGER NOT NULL,
    span_end INTEGER NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
"#;

/// Vector store over a single SQLite database.
pub struct VectorStore {
    conn: Connection,
    dimension: usize,
}

impl VectorStore {
    /// Open (or create) a store at `path` for vectors of `dimension`.
    ///
    /// A store previously built with a different dimension fails with
    /// `DimensionMismatch` before any data is touched.
    pub fn open(path: &Path, dimension: usize) -> RagResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RagError::Store(format!("Failed to create store directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| RagError::Store(format!("Failed to open store at {:?}: {}", path, e)))?;

        Self::init(conn, dimension)
    }

    /// Open an in-memory store (tests and throwaway runs).
    pub fn open_in_memory(dimension: usize) -> RagResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RagError::Store(format!("Failed to open in-memory store: {}", e)))?;
        Self::init(conn, dimension)
    }

    fn init(conn: Connection, dimension: usize) -> RagResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| RagError::Store(format!("Failed to create tables: {}", e)))?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'embedding_dim'",
                [],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(RagError::Store(format!("Failed to read store meta: {}", other))),
            })?;

        match stored {
            Some(value) => {
                let stored_dim: usize = value.parse().map_err(|_| {
                    RagError::Store(format!("Corrupt embedding_dim in store meta: {}", value))
                })?;
                if stored_dim != dimension {
                    return Err(RagError::DimensionMismatch {
                        expected: stored_dim,
                        actual: dimension,
                    });
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('embedding_dim', ?1)",
                    params![dimension.to_string()],
                )
                .map_err(|e| RagError::Store(format!("Failed to write store meta: {}", e)))?;
            }
        }

        tracing::debug!(dimension, "Opened vector store");

        Ok(Self { conn, dimension })
    }

    /// The fixed embedding dimension of this store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Content hash of a stored document, if present.
    pub fn document_hash(&self, document_id: &str) -> RagResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT content_hash FROM documents WHERE id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(RagError::Store(format!(
                    "Failed to look up document: {}",
                    other
                ))),
            })
    }

    /// Replace a document and all of its chunks atomically.
    ///
    /// Prior chunks for the document id are deleted and the new set inserted
    /// in one transaction; either all old chunks are replaced or none are.
    pub fn replace_document(
        &mut self,
        record: &DocumentRecord,
        chunks: &[Chunk],
    ) -> RagResult<()> {
        for chunk in chunks {
            self.check_dimension(chunk.embedding.len())?;
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| RagError::Store(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![record.id],
        )
        .map_err(|e| RagError::Store(format!("Failed to delete prior chunks: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO documents (id, origin, content_hash, ingested_at, chunk_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.origin,
                record.content_hash,
                record.ingested_at.to_rfc3339(),
                record.chunk_count as i64,
            ],
        )
        .map_err(|e| RagError::Store(format!("Failed to upsert document: {}", e)))?;

        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (id, document_id, ordinal, text, span_start, span_end, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    chunk.id,
                    chunk.document_id,
                    chunk.ordinal as i64,
                    chunk.text,
                    chunk.span.0 as i64,
                    chunk.span.1 as i64,
                    embedding_to_bytes(&chunk.embedding),
                ],
            )
            .map_err(|e| RagError::Store(format!("Failed to insert chunk: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| RagError::Store(format!("Failed to commit document replace: {}", e)))?;

        tracing::debug!(
            document = %record.id,
            chunks = chunks.len(),
            "Replaced document in store"
        );

        Ok(())
    }

    /// Delete a document and its chunks. Returns whether it existed.
    pub fn delete_document(&mut self, document_id: &str) -> RagResult<bool> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| RagError::Store(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id],
        )
        .map_err(|e| RagError::Store(format!("Failed to delete chunks: {}", e)))?;

        let deleted = tx
            .execute("DELETE FROM documents WHERE id = ?1", params![document_id])
            .map_err(|e| RagError::Store(format!("Failed to delete document: {}", e)))?;

        tx.commit()
            .map_err(|e| RagError::Store(format!("Failed to commit delete: {}", e)))?;

        Ok(deleted > 0)
    }

    /// Top-k nearest chunks by cosine similarity.
    ///
    /// Full scan, sorted by score descending; ties broken by insertion order
    /// (earlier-inserted wins) so results are deterministic.
    pub fn query(&self, vector: &[f32], k: usize) -> RagResult<Vec<ScoredChunk>> {
        self.check_dimension(vector.len())?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, document_id, ordinal, text, span_start, span_end, embedding, rowid
                 FROM chunks",
            )
            .map_err(|e| RagError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let embedding_bytes: Vec<u8> = row.get(6)?;
                let rowid: i64 = row.get(7)?;
                Ok((
                    Chunk {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        ordinal: row.get::<_, i64>(2)? as u32,
                        text: row.get(3)?,
                        span: (
                            row.get::<_, i64>(4)? as usize,
                            row.get::<_, i64>(5)? as usize,
                        ),
                        embedding: bytes_to_embedding(&embedding_bytes),
                    },
                    rowid,
                ))
            })
            .map_err(|e| RagError::Store(format!("Failed to scan chunks: {}", e)))?;

        let mut scored: Vec<(ScoredChunk, i64)> = Vec::new();
        for row in rows {
            let (chunk, rowid) =
                row.map_err(|e| RagError::Store(format!("Failed to read chunk row: {}", e)))?;
            let score = cosine_similarity(vector, &chunk.embedding);
            scored.push((ScoredChunk { chunk, score }, rowid));
        }

        scored.sort_by(|a, b| {
            b.0.score
                .partial_cmp(&a.0.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });
        scored.truncate(k);

        tracing::debug!(returned = scored.len(), requested = k, "Vector query");

        Ok(scored.into_iter().map(|(hit, _)| hit).collect())
    }

    /// Document and chunk counts.
    pub fn stats(&self) -> RagResult<StoreStats> {
        let documents: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(|e| RagError::Store(format!("Failed to count documents: {}", e)))?;

        let chunks: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(|e| RagError::Store(format!("Failed to count chunks: {}", e)))?;

        Ok(StoreStats {
            documents: documents as u32,
            chunks: chunks as u32,
        })
    }

    fn check_dimension(&self, actual: usize) -> RagResult<()> {
        if actual != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }
}

/// Serialize an embedding as little-endian f32 bytes.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize little-endian f32 bytes back into an embedding.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, hash: &str, chunk_count: u32) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            origin: id.to_string(),
            content_hash: hash.to_string(),
            ingested_at: Utc::now(),
            chunk_count,
        }
    }

    fn chunk(id: &str, document_id: &str, ordinal: u32, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: document_id.to_string(),
            ordinal,
            text: format!("chunk {}", id),
            span: (0, 10),
            embedding,
        }
    }

    #[test]
    fn test_replace_and_query() {
        let mut store = VectorStore::open_in_memory(3).unwrap();

        store
            .replace_document(
                &record("doc1", "h1", 2),
                &[
                    chunk("c1", "doc1", 0, vec![1.0, 0.0, 0.0]),
                    chunk("c2", "doc1", 1, vec![0.0, 1.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.id, "c1");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_query_returns_fewer_than_k() {
        let mut store = VectorStore::open_in_memory(3).unwrap();
        store
            .replace_document(
                &record("doc1", "h1", 1),
                &[chunk("c1", "doc1", 0, vec![1.0, 0.0, 0.0])],
            )
            .unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_score_ties_break_by_insertion_order() {
        let mut store = VectorStore::open_in_memory(3).unwrap();
        store
            .replace_document(
                &record("doc1", "h1", 1),
                &[chunk("first", "doc1", 0, vec![1.0, 0.0, 0.0])],
            )
            .unwrap();
        store
            .replace_document(
                &record("doc2", "h2", 1),
                &[chunk("second", "doc2", 0, vec![1.0, 0.0, 0.0])],
            )
            .unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].chunk.id, "first");
        assert_eq!(hits[1].chunk.id, "second");
    }

    #[test]
    fn test_replace_supersedes_prior_chunks() {
        let mut store = VectorStore::open_in_memory(3).unwrap();
        store
            .replace_document(
                &record("doc1", "h1", 2),
                &[
                    chunk("old1", "doc1", 0, vec![1.0, 0.0, 0.0]),
                    chunk("old2", "doc1", 1, vec![0.9, 0.1, 0.0]),
                ],
            )
            .unwrap();

        store
            .replace_document(
                &record("doc1", "h2", 1),
                &[chunk("new1", "doc1", 0, vec![1.0, 0.0, 0.0])],
            )
            .unwrap();

        let hits = store.query(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "new1");
        assert_eq!(store.document_hash("doc1").unwrap().as_deref(), Some("h2"));
    }

    #[test]
    fn test_delete_document() {
        let mut store = VectorStore::open_in_memory(3).unwrap();
        store
            .replace_document(
                &record("doc1", "h1", 1),
                &[chunk("c1", "doc1", 0, vec![1.0, 0.0, 0.0])],
            )
            .unwrap();

        assert!(store.delete_document("doc1").unwrap());
        assert!(!store.delete_document("doc1").unwrap());
        assert!(store.query(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_on_upsert_and_query() {
        let mut store = VectorStore::open_in_memory(3).unwrap();

        let result = store.replace_document(
            &record("doc1", "h1", 1),
            &[chunk("c1", "doc1", 0, vec![1.0, 0.0])],
        );
        assert!(matches!(
            result,
            Err(RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        // Nothing was written by the failed upsert.
        assert_eq!(store.stats().unwrap().chunks, 0);

        let result = store.query(&[1.0, 0.0], 3);
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_dimension_recorded_and_checked_on_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        {
            let mut store = VectorStore::open(&path, 384).unwrap();
            store
                .replace_document(
                    &record("doc1", "h1", 1),
                    &[chunk("c1", "doc1", 0, vec![0.5; 384])],
                )
                .unwrap();
        }

        // Same dimension reopens fine and data survived the restart.
        let store = VectorStore::open(&path, 384).unwrap();
        assert_eq!(store.stats().unwrap().chunks, 1);
        drop(store);

        // A different dimension is rejected before any data access.
        let result = VectorStore::open(&path, 768);
        assert!(matches!(
            result,
            Err(RagError::DimensionMismatch {
                expected: 384,
                actual: 768
            })
        ));
    }

    #[test]
    fn test_embedding_codec_roundtrip() {
        let embedding = vec![0.25, -1.5, 3.75];
        let bytes = embedding_to_bytes(&embedding);
        assert_eq!(bytes_to_embedding(&bytes), embedding);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!((cosine_similarity(&a, &[0.0, 1.0, 0.0])).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }
}
