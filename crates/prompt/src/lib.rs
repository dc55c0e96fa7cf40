//! Prompt templating and assembly for docqa.
//!
//! Loads the externally configured generation template and assembles
//! retrieved context + query into a budget-bounded prompt.

pub mod assembler;
pub mod loader;
pub mod types;

// Re-export main types
pub use assembler::PromptAssembler;
pub use types::{Assembly, HistoryTurn, PromptContext, PromptTemplate};
