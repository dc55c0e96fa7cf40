//! Configuration for the docqa pipeline.
//!
//! Configuration is resolved once at process start from three layers, later
//! layers winning: built-in defaults, an optional YAML file (`docqa.yaml`),
//! and `DOCQA_*` environment variables. It is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RagError, RagResult};

/// What the prompt assembler does when retrieval returns no usable context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyContextPolicy {
    /// Answer with a canned "cannot answer" message without calling the model.
    #[default]
    Refuse,
    /// Fall back to a context-free prompt (instructions + query only).
    ContextFree,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the local Ollama server
    pub ollama_endpoint: String,

    /// Embedding provider ("ollama" or "trigram")
    pub embedding_provider: String,

    /// Embedding model identifier (must match the one the store was built with)
    pub embedding_model: String,

    /// Embedding vector dimension
    pub embedding_dim: usize,

    /// Generation model identifier
    pub generation_model: String,

    /// Sampling temperature for generation
    pub temperature: f32,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap stride between consecutive chunks, in characters
    pub chunk_overlap: usize,

    /// How far from the target size a preferred boundary may be, in characters
    pub chunk_tolerance: usize,

    /// Default number of chunks to retrieve per query
    pub top_k: usize,

    /// Minimum cosine similarity for a retrieved chunk to be kept
    pub min_score: f32,

    /// Optional prompt template file; the built-in template is used when unset
    pub prompt_template: Option<PathBuf>,

    /// Maximum length of the assembled prompt, in characters
    pub prompt_budget: usize,

    /// Maximum cumulative generation output, in characters
    pub max_output_chars: usize,

    /// Behavior when no context chunks survive retrieval filtering
    pub empty_context: EmptyContextPolicy,

    /// Vector store location on disk
    pub store_path: PathBuf,

    /// Log level override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Disable colored log output
    #[serde(default)]
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_endpoint: "http://localhost:11434".to_string(),
            embedding_provider: "ollama".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            embedding_dim: 768,
            generation_model: "qwen2.5:1.5b".to_string(),
            temperature: 0.3,
            chunk_size: 400,
            chunk_overlap: 80,
            chunk_tolerance: 100,
            top_k: 3,
            min_score: 0.20,
            prompt_template: None,
            prompt_budget: 8_000,
            max_output_chars: 16_000,
            empty_context: EmptyContextPolicy::Refuse,
            store_path: PathBuf::from("./docqa.db"),
            log_level: None,
            no_color: false,
        }
    }
}

/// Partial configuration as it appears in `docqa.yaml`.
///
/// Every field is optional so a file only has to spell out what it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    ollama_endpoint: Option<String>,
    embedding_provider: Option<String>,
    embedding_model: Option<String>,
    embedding_dim: Option<usize>,
    generation_model: Option<String>,
    temperature: Option<f32>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    chunk_tolerance: Option<usize>,
    top_k: Option<usize>,
    min_score: Option<f32>,
    prompt_template: Option<PathBuf>,
    prompt_budget: Option<usize>,
    max_output_chars: Option<usize>,
    empty_context: Option<EmptyContextPolicy>,
    store_path: Option<PathBuf>,
    log_level: Option<String>,
    no_color: Option<bool>,
}

impl AppConfig {
    /// Load configuration from defaults, an optional YAML file, and the
    /// environment.
    ///
    /// The file is taken from `DOCQA_CONFIG` if set, otherwise `./docqa.yaml`
    /// if present. Environment variables override file values:
    /// `DOCQA_OLLAMA_ENDPOINT`, `DOCQA_EMBEDDING_PROVIDER`,
    /// `DOCQA_EMBEDDING_MODEL`, `DOCQA_GENERATION_MODEL`, `DOCQA_STORE_PATH`,
    /// `DOCQA_PROMPT_TEMPLATE`, `RUST_LOG`, `NO_COLOR`.
    pub fn load() -> RagResult<Self> {
        let mut config = Self::default();

        let config_path = match std::env::var("DOCQA_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => {
                let default_path = PathBuf::from("docqa.yaml");
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_path {
            config.merge_yaml(&path)?;
        }

        if let Ok(endpoint) = std::env::var("DOCQA_OLLAMA_ENDPOINT") {
            config.ollama_endpoint = endpoint;
        }
        if let Ok(provider) = std::env::var("DOCQA_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider;
        }
        if let Ok(model) = std::env::var("DOCQA_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(model) = std::env::var("DOCQA_GENERATION_MODEL") {
            config.generation_model = model;
        }
        if let Ok(path) = std::env::var("DOCQA_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("DOCQA_PROMPT_TEMPLATE") {
            config.prompt_template = Some(PathBuf::from(path));
        }
        config.log_level = std::env::var("RUST_LOG").ok().or(config.log_level);
        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> RagResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            RagError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = file.$field {
                    self.$field = value;
                })*
            };
        }
        take!(
            ollama_endpoint,
            embedding_provider,
            embedding_model,
            embedding_dim,
            generation_model,
            temperature,
            chunk_size,
            chunk_overlap,
            chunk_tolerance,
            top_k,
            min_score,
            prompt_budget,
            max_output_chars,
            empty_context,
            store_path,
            no_color,
        );
        if file.prompt_template.is_some() {
            self.prompt_template = file.prompt_template;
        }
        if file.log_level.is_some() {
            self.log_level = file.log_level;
        }

        Ok(())
    }

    /// Validate cross-field constraints. Violations are startup-fatal.
    pub fn validate(&self) -> RagResult<()> {
        let known_providers = ["ollama", "trigram"];
        if !known_providers.contains(&self.embedding_provider.as_str()) {
            return Err(RagError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding_provider,
                known_providers.join(", ")
            )));
        }

        if self.embedding_dim == 0 {
            return Err(RagError::Config(
                "embedding_dim must be non-zero".to_string(),
            ));
        }

        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be non-zero".to_string()));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be non-zero".to_string()));
        }

        if self.prompt_budget == 0 || self.max_output_chars == 0 {
            return Err(RagError::Config(
                "prompt_budget and max_output_chars must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
