//! Corpus management for docqa.
//!
//! Everything between raw documents and retrieved context lives here:
//! chunking, embedding providers, the SQLite-backed vector store, the
//! ingestion pipeline, and the retriever.

pub mod chunker;
pub mod embeddings;
pub mod ingest;
pub mod retriever;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chunker::ChunkPolicy;
pub use embeddings::{create_provider, EmbeddingProvider, OllamaEmbedder, TrigramEmbedder};
pub use ingest::IngestionPipeline;
pub use retriever::Retriever;
pub use store::VectorStore;
pub use types::{
    Chunk, DocumentOutcome, DocumentRecord, IngestFailure, IngestReport, RetrievalResult,
    ScoredChunk, StoreStats,
};
