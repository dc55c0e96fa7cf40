//! Query-time retrieval.
//!
//! Embeds the query, runs a nearest-neighbor search against the store,
//! filters by minimum score, and truncates to k. An unreachable embedding
//! model is a typed `EmbeddingUnavailable` error — callers must be able to
//! tell "no relevant documents" from "retrieval subsystem down". Zero
//! survivors after filtering is an empty result, not an error.

use std::sync::Arc;
use tokio::sync::Mutex;

use docqa_core::RagResult;

use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::RetrievalResult;

/// Retriever over a shared store and embedding provider.
pub struct Retriever {
    store: Arc<Mutex<VectorStore>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<Mutex<VectorStore>>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Retrieve the top-k chunks most similar to `query`, dropping any whose
    /// score falls below `min_score`.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> RagResult<RetrievalResult> {
        let query_embedding = self.embedder.embed(query).await?;

        let mut hits = self.store.lock().await.query(&query_embedding, k)?;
        hits.retain(|hit| hit.score >= min_score);
        hits.truncate(k);

        if hits.is_empty() {
            tracing::info!(
                "No relevant chunks found (all scores below {:.2} threshold)",
                min_score
            );
        } else {
            tracing::info!(
                "Retrieved {} relevant chunks (top score: {:.3}, lowest: {:.3})",
                hits.len(),
                hits.first().map(|h| h.score).unwrap_or(0.0),
                hits.last().map(|h| h.score).unwrap_or(0.0)
            );
        }

        Ok(RetrievalResult { hits })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkPolicy;
    use crate::embeddings::TrigramEmbedder;
    use crate::ingest::IngestionPipeline;
    use async_trait::async_trait;
    use docqa_core::RagError;

    const DIM: usize = 64;

    async fn seeded_retriever() -> Retriever {
        let store = Arc::new(Mutex::new(VectorStore::open_in_memory(DIM).unwrap()));
        let embedder = Arc::new(TrigramEmbedder::new(DIM));

        let pipeline = IngestionPipeline::new(
            store.clone(),
            embedder.clone(),
            ChunkPolicy::new(100, 0, 30),
        );
        pipeline
            .ingest_document("sky.txt", "The sky is blue.")
            .await
            .unwrap();
        pipeline
            .ingest_document("grass.txt", "Grass is green.")
            .await
            .unwrap();

        Retriever::new(store, embedder)
    }

    #[tokio::test]
    async fn test_retrieves_most_similar_chunk_first() {
        let retriever = seeded_retriever().await;

        let result = retriever
            .retrieve("What color is the sky?", 1, 0.0)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.hits[0].chunk.text, "The sky is blue.");
    }

    #[tokio::test]
    async fn test_scores_are_non_increasing() {
        let retriever = seeded_retriever().await;

        let result = retriever
            .retrieve("sky and grass colors", 10, 0.0)
            .await
            .unwrap();

        for pair in result.hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_k_larger_than_corpus_is_not_an_error() {
        let retriever = seeded_retriever().await;

        let result = retriever
            .retrieve("What color is the sky?", 10, 0.0)
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_min_score_filter_can_empty_the_result() {
        let retriever = seeded_retriever().await;

        // An impossible threshold: empty result, not an error.
        let result = retriever
            .retrieve("What color is the sky?", 5, 2.0)
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    /// Embedder that always fails, standing in for a down embedding service.
    #[derive(Debug)]
    struct DownEmbedder;

    #[async_trait]
    impl EmbeddingProvider for DownEmbedder {
        fn provider_name(&self) -> &str {
            "down"
        }

        fn model_name(&self) -> &str {
            "down"
        }

        fn dimension(&self) -> usize {
            DIM
        }

        async fn embed_batch(&self, _texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
            Err(RagError::EmbeddingUnavailable(
                "connection refused".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_is_typed_not_empty() {
        let store = Arc::new(Mutex::new(VectorStore::open_in_memory(DIM).unwrap()));
        let retriever = Retriever::new(store, Arc::new(DownEmbedder));

        let result = retriever.retrieve("anything", 3, 0.0).await;
        assert!(matches!(result, Err(RagError::EmbeddingUnavailable(_))));
    }
}
