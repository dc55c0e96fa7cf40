//! Prompt template loading and validation.

use std::path::Path;

use docqa_core::{RagError, RagResult};

use crate::types::PromptTemplate;

/// Placeholders a template must reference.
const REQUIRED_PLACEHOLDERS: &[&str] = &["{{context}}", "{{query}}"];

impl PromptTemplate {
    /// Load a template from a YAML file with `instructions` and `template`
    /// fields.
    ///
    /// Parse and contract violations are returned as `Template` errors and
    /// are meant to be fatal at startup.
    pub fn load(path: &Path) -> RagResult<Self> {
        tracing::debug!("Loading prompt template from {:?}", path);

        let contents = std::fs::read_to_string(path).map_err(|e| {
            RagError::Template(format!("Failed to read template file {:?}: {}", path, e))
        })?;

        let template: PromptTemplate = serde_yaml::from_str(&contents).map_err(|e| {
            RagError::Template(format!("Failed to parse template YAML {:?}: {}", path, e))
        })?;

        template.validate()?;

        tracing::info!("Loaded prompt template from {:?}", path);
        Ok(template)
    }

    /// The built-in template used when no file is configured.
    pub fn builtin() -> Self {
        Self {
            instructions: "\
You are a careful assistant answering questions about a private document collection.\n\
Answer strictly from the context below. Do not invent information. If the context \
does not contain the answer, say that the documents do not mention it."
                .to_string(),
            template: "\
{{instructions}}\n\
\n\
Context:\n\
{{context}}\n\
\n\
{{#if history}}\
Conversation so far:\n\
{{history}}\n\
\n\
{{/if}}\
Question: {{query}}\n\
\n\
Answer:"
                .to_string(),
        }
    }

    /// Check the placeholder contract.
    pub fn validate(&self) -> RagResult<()> {
        if self.template.trim().is_empty() {
            return Err(RagError::Template("Template body is empty".to_string()));
        }

        for placeholder in REQUIRED_PLACEHOLDERS {
            if !self.template.contains(placeholder) {
                return Err(RagError::Template(format!(
                    "Template is missing the required {} placeholder",
                    placeholder
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_template_is_valid() {
        let template = PromptTemplate::builtin();
        assert!(template.validate().is_ok());
        assert!(template.template.contains("{{context}}"));
        assert!(template.template.contains("{{query}}"));
    }

    #[test]
    fn test_load_valid_template() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "instructions: Answer from context only.\n\
             template: \"{{{{instructions}}}}\\n{{{{context}}}}\\nQ: {{{{query}}}}\"\n"
        )
        .unwrap();

        let template = PromptTemplate::load(file.path()).unwrap();
        assert_eq!(template.instructions, "Answer from context only.");
    }

    #[test]
    fn test_load_missing_file() {
        let result = PromptTemplate::load(Path::new("/no/such/template.yaml"));
        assert!(matches!(result, Err(RagError::Template(_))));
    }

    #[test]
    fn test_missing_query_placeholder_is_fatal() {
        let template = PromptTemplate {
            instructions: String::new(),
            template: "{{instructions}} {{context}}".to_string(),
        };
        let result = template.validate();
        assert!(matches!(result, Err(RagError::Template(_))));
        assert!(result.unwrap_err().to_string().contains("{{query}}"));
    }

    #[test]
    fn test_invalid_yaml_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "instructions: [unclosed").unwrap();

        assert!(PromptTemplate::load(file.path()).is_err());
    }
}
