//! Ingest command handler.

use clap::Args;
use std::path::PathBuf;

use docqa_core::{AppConfig, RagResult};

/// Ingest documents into the corpus
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// File or directory of text documents to ingest
    pub path: PathBuf,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> RagResult<()> {
        tracing::info!("Ingesting from {:?}", self.path);

        let engine = super::build_engine(config)?;
        let report = engine.ingest(&self.path).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("Ingested:  {} documents", report.documents_ingested);
        println!("Unchanged: {} documents", report.documents_unchanged);
        println!("Skipped:   {} documents", report.documents_skipped);
        println!("Chunks:    {}", report.chunks_created);

        if !report.failures.is_empty() {
            println!("Failures:");
            for failure in &report.failures {
                println!("  {}: {}", failure.origin, failure.reason);
            }
        }

        Ok(())
    }
}
