//! Ask command handler.
//!
//! Streams answer tokens to stdout as they arrive; `--no-stream` buffers the
//! whole answer first. Ctrl-C mid-answer cancels the session cooperatively.

use clap::Args;
use std::io::Write;

use docqa_core::{AppConfig, RagError, RagResult};
use docqa_engine::{AnswerEvent, FinishReason, QueryOutput, QueryRequest};

/// Ask a question against the corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of context chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum similarity score for retrieved chunks
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Buffer the full answer instead of streaming tokens
    #[arg(long)]
    pub no_stream: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> RagResult<()> {
        let engine = super::build_engine(config)?;

        let mut request = QueryRequest::new(&self.question);
        if let Some(top_k) = self.top_k {
            request = request.with_top_k(top_k);
        }
        if let Some(min_score) = self.min_score {
            request = request.with_min_score(min_score);
        }
        if self.no_stream {
            request = request.buffered();
        }

        match engine.handle_query(request).await? {
            QueryOutput::Buffered { answer, .. } => {
                println!("{}", answer.text);
                report_finish(&answer.finish);
            }
            QueryOutput::Streamed(mut stream) => {
                let session_id = stream.session_id;

                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            engine.handle_cancel(session_id)?;
                        }
                        event = stream.events.recv() => match event {
                            Some(AnswerEvent::Delta(delta)) => {
                                print!("{}", delta);
                                std::io::stdout().flush().ok();
                            }
                            Some(AnswerEvent::Done(reason)) => {
                                println!();
                                report_finish(&reason);
                                break;
                            }
                            None => {
                                return Err(RagError::Generation(
                                    "Answer stream ended unexpectedly".to_string(),
                                ));
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn report_finish(reason: &FinishReason) {
    match reason {
        FinishReason::Complete => {}
        FinishReason::Truncated => eprintln!("[answer truncated at the output limit]"),
        FinishReason::Cancelled => eprintln!("[cancelled]"),
        FinishReason::Failed(message) => eprintln!("[incomplete: generation failed: {}]", message),
    }
}
