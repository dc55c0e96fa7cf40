//! Prompt assembly.
//!
//! Merges retrieved chunks, conversation history, and the user query into a
//! bounded-length generation prompt. Assembly is pure and deterministic:
//! the same inputs always produce the same text.

use handlebars::Handlebars;

use docqa_core::{EmptyContextPolicy, RagError, RagResult};
use docqa_corpus::{RetrievalResult, ScoredChunk};

use crate::types::{Assembly, HistoryTurn, PromptContext, PromptTemplate};

/// Separator between context blocks.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Assembles prompts under a character budget.
pub struct PromptAssembler {
    registry: Handlebars<'static>,
    instructions: String,
    budget: usize,
    empty_context: EmptyContextPolicy,
}

impl PromptAssembler {
    /// Build an assembler from a validated template.
    ///
    /// Template registration errors (Handlebars syntax) surface here, at
    /// startup, never per query.
    pub fn new(
        template: &PromptTemplate,
        budget: usize,
        empty_context: EmptyContextPolicy,
    ) -> RagResult<Self> {
        template.validate()?;

        let mut registry = Handlebars::new();
        // Plain text prompts; no HTML escaping.
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string("prompt", &template.template)
            .map_err(|e| RagError::Template(format!("Failed to register template: {}", e)))?;

        Ok(Self {
            registry,
            instructions: template.instructions.clone(),
            budget,
            empty_context,
        })
    }

    /// Assemble a prompt for `query` from the retrieval result and optional
    /// conversation history.
    ///
    /// Chunks are packed highest-score-first; when the budget would be
    /// exceeded the lowest-scoring chunks are dropped and the result carries
    /// the `truncated` marker. The query is always included verbatim. With no
    /// usable context the configured policy decides between a context-free
    /// prompt and a refusal.
    pub fn assemble(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
        history: &[HistoryTurn],
    ) -> RagResult<Assembly> {
        if retrieval.is_empty() && self.empty_context == EmptyContextPolicy::Refuse {
            tracing::info!("No context retrieved; refusing per configuration");
            return Ok(Assembly::Refused {
                message: format!(
                    "I could not find information about \"{}\" in the available documents.",
                    query
                ),
            });
        }

        let history_text = format_history(history);

        // The rendered prompt is the base (instructions + history + query)
        // plus the context inserted at its placeholder, so budget accounting
        // can be done on the blocks alone.
        let base = self.render("", query, &history_text)?;
        let base_chars = base.chars().count();
        let mut remaining = self.budget.saturating_sub(base_chars);

        let mut blocks: Vec<String> = Vec::new();
        for hit in &retrieval.hits {
            let block = format_block(hit);
            let separator = if blocks.is_empty() {
                0
            } else {
                BLOCK_SEPARATOR.len()
            };
            let cost = block.chars().count() + separator;

            if cost > remaining {
                break;
            }
            remaining -= cost;
            blocks.push(block);
        }

        let dropped = retrieval.len() - blocks.len();
        if dropped > 0 {
            tracing::debug!(dropped, "Context chunks dropped to fit prompt budget");
        }

        let context = blocks.join(BLOCK_SEPARATOR);
        let text = self.render(&context, query, &history_text)?;

        Ok(Assembly::Prompt(PromptContext {
            text,
            query: query.to_string(),
            truncated: dropped > 0 || base_chars > self.budget,
            context_chunks: blocks.len(),
        }))
    }

    fn render(&self, context: &str, query: &str, history: &str) -> RagResult<String> {
        let values = serde_json::json!({
            "instructions": self.instructions,
            "context": context,
            "query": query,
            "history": history,
        });

        self.registry
            .render("prompt", &values)
            .map_err(|e| RagError::Template(format!("Failed to render template: {}", e)))
    }
}

/// Format one retrieved chunk with a light provenance marker.
fn format_block(hit: &ScoredChunk) -> String {
    format!(
        "[source: {}#{}]\n{}",
        hit.chunk.document_id,
        hit.chunk.ordinal,
        hit.chunk.text.trim()
    )
}

/// Format conversation history for the `{{history}}` placeholder.
fn format_history(history: &[HistoryTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("Q: {}\nA: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_corpus::Chunk;

    fn hit(document_id: &str, ordinal: u32, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: format!("{}#{}", document_id, ordinal),
                document_id: document_id.to_string(),
                ordinal,
                text: text.to_string(),
                span: (0, text.len()),
                embedding: vec![],
            },
            score,
        }
    }

    fn assembler(budget: usize, empty_context: EmptyContextPolicy) -> PromptAssembler {
        PromptAssembler::new(&PromptTemplate::builtin(), budget, empty_context).unwrap()
    }

    fn retrieval() -> RetrievalResult {
        RetrievalResult {
            hits: vec![
                hit("sky.txt", 0, "The sky is blue.", 0.9),
                hit("grass.txt", 0, "Grass is green.", 0.5),
            ],
        }
    }

    #[test]
    fn test_prompt_contains_query_and_context_in_score_order() {
        let assembler = assembler(4_000, EmptyContextPolicy::Refuse);
        let assembly = assembler
            .assemble("What color is the sky?", &retrieval(), &[])
            .unwrap();

        let prompt = match assembly {
            Assembly::Prompt(prompt) => prompt,
            Assembly::Refused { .. } => panic!("expected a prompt"),
        };

        assert!(prompt.text.contains("What color is the sky?"));
        assert!(prompt.text.contains("[source: sky.txt#0]"));
        assert!(!prompt.truncated);
        assert_eq!(prompt.context_chunks, 2);

        let sky_at = prompt.text.find("The sky is blue.").unwrap();
        let grass_at = prompt.text.find("Grass is green.").unwrap();
        assert!(sky_at < grass_at, "higher-scoring chunk must come first");
    }

    #[test]
    fn test_budget_is_respected_and_lowest_dropped_first() {
        // Context-free assembly over an empty retrieval measures the fixed
        // part of the prompt.
        let generous = assembler(4_000, EmptyContextPolicy::ContextFree);
        let base = match generous
            .assemble("Q?", &RetrievalResult::default(), &[])
            .unwrap()
        {
            Assembly::Prompt(p) => p.text.chars().count(),
            Assembly::Refused { .. } => unreachable!(),
        };

        // Room for the first block but not the second.
        let budget = base + 40;
        let tight = assembler(budget, EmptyContextPolicy::Refuse);
        let assembly = tight.assemble("Q?", &retrieval(), &[]).unwrap();

        let prompt = match assembly {
            Assembly::Prompt(prompt) => prompt,
            Assembly::Refused { .. } => panic!("expected a prompt"),
        };

        assert!(prompt.text.chars().count() <= budget);
        assert!(prompt.truncated);
        assert_eq!(prompt.context_chunks, 1);
        assert!(prompt.text.contains("The sky is blue."));
        assert!(!prompt.text.contains("Grass is green."));
        // The query survives truncation verbatim.
        assert!(prompt.text.contains("Q?"));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let assembler = assembler(4_000, EmptyContextPolicy::Refuse);
        let history = vec![HistoryTurn {
            question: "Earlier question".to_string(),
            answer: "Earlier answer".to_string(),
        }];

        let first = assembler
            .assemble("What color is the sky?", &retrieval(), &history)
            .unwrap();
        let second = assembler
            .assemble("What color is the sky?", &retrieval(), &history)
            .unwrap();

        match (first, second) {
            (Assembly::Prompt(a), Assembly::Prompt(b)) => assert_eq!(a.text, b.text),
            _ => panic!("expected prompts"),
        }
    }

    #[test]
    fn test_empty_retrieval_refuses_by_default() {
        let assembler = assembler(4_000, EmptyContextPolicy::Refuse);
        let assembly = assembler
            .assemble("Unknown topic?", &RetrievalResult::default(), &[])
            .unwrap();

        match assembly {
            Assembly::Refused { message } => {
                assert!(message.contains("Unknown topic?"));
                assert!(message.contains("could not find"));
            }
            Assembly::Prompt(_) => panic!("expected refusal"),
        }
    }

    #[test]
    fn test_empty_retrieval_context_free_policy() {
        let assembler = assembler(4_000, EmptyContextPolicy::ContextFree);
        let assembly = assembler
            .assemble("Unknown topic?", &RetrievalResult::default(), &[])
            .unwrap();

        match assembly {
            Assembly::Prompt(prompt) => {
                assert!(prompt.text.contains("Unknown topic?"));
                assert_eq!(prompt.context_chunks, 0);
            }
            Assembly::Refused { .. } => panic!("expected a context-free prompt"),
        }
    }

    #[test]
    fn test_history_is_rendered_when_present() {
        let assembler = assembler(4_000, EmptyContextPolicy::Refuse);
        let history = vec![HistoryTurn {
            question: "What about yesterday?".to_string(),
            answer: "It rained.".to_string(),
        }];

        let assembly = assembler
            .assemble("And today?", &retrieval(), &history)
            .unwrap();

        let prompt = match assembly {
            Assembly::Prompt(prompt) => prompt,
            Assembly::Refused { .. } => panic!("expected a prompt"),
        };
        assert!(prompt.text.contains("Q: What about yesterday?"));
        assert!(prompt.text.contains("A: It rained."));

        // Without history the conversation section disappears entirely.
        let bare = match assembler.assemble("And today?", &retrieval(), &[]).unwrap() {
            Assembly::Prompt(prompt) => prompt,
            Assembly::Refused { .. } => panic!("expected a prompt"),
        };
        assert!(!bare.text.contains("Conversation so far"));
    }

    #[test]
    fn test_broken_template_fails_at_construction() {
        let template = PromptTemplate {
            instructions: String::new(),
            template: "{{context}} {{query}} {{#if}}".to_string(),
        };
        let result = PromptAssembler::new(&template, 1_000, EmptyContextPolicy::Refuse);
        assert!(matches!(result, Err(RagError::Template(_))));
    }
}
