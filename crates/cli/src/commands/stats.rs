//! Stats command handler.

use clap::Args;

use docqa_core::{AppConfig, RagResult};

/// Show corpus statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> RagResult<()> {
        let engine = super::build_engine(config)?;
        let stats = engine.stats().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Store:     {}", config.store_path.display());
            println!("Documents: {}", stats.documents);
            println!("Chunks:    {}", stats.chunks);
        }

        Ok(())
    }
}
