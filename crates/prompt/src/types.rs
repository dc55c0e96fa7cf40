//! Prompt system types.

use serde::{Deserialize, Serialize};

/// A prompt template loaded from YAML (or the built-in default).
///
/// The template is a Handlebars string with a fixed placeholder contract:
/// `{{instructions}}`, `{{context}}`, `{{query}}`, and optional
/// `{{history}}`. Loading validates the contract; a broken template is a
/// startup failure, never a per-query one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Instruction text interpolated at `{{instructions}}`
    pub instructions: String,

    /// Handlebars template body
    pub template: String,
}

/// One past exchange, rendered into the `{{history}}` placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub question: String,
    pub answer: String,
}

/// A fully assembled generation prompt.
///
/// Transient; produced per query. `truncated` marks that context was dropped
/// (or the fixed parts alone exceeded the budget) — a marker, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContext {
    /// The assembled prompt text
    pub text: String,

    /// The user query, verbatim
    pub query: String,

    /// Whether the character budget forced anything to be dropped
    pub truncated: bool,

    /// How many retrieved chunks made it into the context
    pub context_chunks: usize,
}

/// Outcome of prompt assembly.
#[derive(Debug, Clone)]
pub enum Assembly {
    /// A prompt ready for generation.
    Prompt(PromptContext),

    /// Retrieval produced no usable context and configuration says to
    /// refuse rather than answer context-free. `message` is the full canned
    /// answer; no model call should be made.
    Refused { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_yaml_roundtrip() {
        let yaml = "instructions: Be brief.\ntemplate: \"{{instructions}} {{context}} {{query}}\"\n";
        let template: PromptTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.instructions, "Be brief.");
        assert!(template.template.contains("{{query}}"));
    }
}
