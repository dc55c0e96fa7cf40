//! Query engine facade.
//!
//! The surface consumed by whatever transport sits above (HTTP handler, CLI,
//! tests): submit a query, stream or buffer the answer, cancel a session,
//! ingest documents. All pipeline wiring happens once here, at startup.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use docqa_core::{AppConfig, RagResult};
use docqa_corpus::{
    create_provider, ChunkPolicy, IngestReport, IngestionPipeline, Retriever, StoreStats,
    VectorStore,
};
use docqa_llm::LlmClient;
use docqa_prompt::{Assembly, HistoryTurn, PromptAssembler, PromptTemplate};

use crate::controller::{collect_answer, GenerationController};
use crate::session::{AnswerStream, FinishReason, SessionId, SessionInfo, SessionRegistry};

/// A query as submitted by the transport layer.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// The natural-language question
    pub text: String,

    /// Override of the configured top-k
    pub top_k: Option<usize>,

    /// Override of the configured score threshold
    pub min_score: Option<f32>,

    /// Prior exchanges to include in the prompt
    pub history: Vec<HistoryTurn>,

    /// Stream increments (true) or buffer the full answer (false)
    pub stream: bool,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: None,
            min_score: None,
            history: Vec::new(),
            stream: true,
        }
    }

    pub fn buffered(mut self) -> Self {
        self.stream = false;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// A fully buffered answer.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub finish: FinishReason,
}

/// What a query returns: a live stream or a drained answer.
pub enum QueryOutput {
    Streamed(AnswerStream),
    Buffered {
        session_id: SessionId,
        answer: Answer,
    },
}

/// The assembled RAG pipeline.
pub struct QueryEngine {
    config: AppConfig,
    store: Arc<Mutex<VectorStore>>,
    retriever: Retriever,
    assembler: PromptAssembler,
    controller: GenerationController,
    pipeline: IngestionPipeline,
    registry: Arc<SessionRegistry>,
}

impl QueryEngine {
    /// Wire up the pipeline from configuration.
    ///
    /// Opens the store (dimension-checked against its metadata), builds the
    /// embedding provider, and loads + validates the prompt template — all
    /// failures here are startup-fatal. The generation client is injected so
    /// transports and tests choose the backend.
    pub fn new(config: AppConfig, client: Arc<dyn LlmClient>) -> RagResult<Self> {
        config.validate()?;

        let store = Arc::new(Mutex::new(VectorStore::open(
            &config.store_path,
            config.embedding_dim,
        )?));

        let embedder = create_provider(&config)?;

        let template = match &config.prompt_template {
            Some(path) => PromptTemplate::load(path)?,
            None => PromptTemplate::builtin(),
        };
        let assembler =
            PromptAssembler::new(&template, config.prompt_budget, config.empty_context)?;

        let registry = Arc::new(SessionRegistry::new());
        let controller = GenerationController::new(
            client,
            Arc::clone(&registry),
            config.generation_model.clone(),
            config.temperature,
            config.max_output_chars,
        );

        let policy = ChunkPolicy::new(
            config.chunk_size,
            config.chunk_overlap,
            config.chunk_tolerance,
        );
        let pipeline = IngestionPipeline::new(Arc::clone(&store), Arc::clone(&embedder), policy);
        let retriever = Retriever::new(Arc::clone(&store), embedder);

        tracing::info!(
            store = %config.store_path.display(),
            embedding_model = %config.embedding_model,
            generation_model = %config.generation_model,
            "Query engine ready"
        );

        Ok(Self {
            config,
            store,
            retriever,
            assembler,
            controller,
            pipeline,
            registry,
        })
    }

    /// Answer a query.
    ///
    /// Retrieval → prompt assembly → generation. Distinct queries are
    /// independent; ordering is only guaranteed within one session's stream.
    pub async fn handle_query(&self, request: QueryRequest) -> RagResult<QueryOutput> {
        let k = request.top_k.unwrap_or(self.config.top_k);
        let min_score = request.min_score.unwrap_or(self.config.min_score);

        tracing::info!(query = %request.text, k, "Handling query");

        let retrieval = self.retriever.retrieve(&request.text, k, min_score).await?;
        let assembly = self
            .assembler
            .assemble(&request.text, &retrieval, &request.history)?;

        let stream = match assembly {
            Assembly::Refused { message } => self.controller.start_canned(message),
            Assembly::Prompt(prompt) => {
                if prompt.truncated {
                    tracing::debug!("Prompt was truncated to fit the budget");
                }
                self.controller.start(prompt)
            }
        };

        if request.stream {
            Ok(QueryOutput::Streamed(stream))
        } else {
            let mut stream = stream;
            let (text, finish) = collect_answer(&mut stream).await?;
            Ok(QueryOutput::Buffered {
                session_id: stream.session_id,
                answer: Answer { text, finish },
            })
        }
    }

    /// Cancel an in-flight session.
    pub fn handle_cancel(&self, session_id: SessionId) -> RagResult<()> {
        self.registry.cancel(session_id)
    }

    /// Ingest a file or directory into the corpus.
    ///
    /// This is the sole write path into the vector store.
    pub async fn ingest(&self, path: &Path) -> RagResult<IngestReport> {
        self.pipeline.ingest_path(path).await
    }

    /// Snapshot of a session's state, if it exists.
    pub fn session(&self, session_id: SessionId) -> Option<SessionInfo> {
        self.registry.get(session_id)
    }

    /// Store-level counts.
    pub async fn stats(&self) -> RagResult<StoreStats> {
        self.store.lock().await.stats()
    }
}
