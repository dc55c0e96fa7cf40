//! docqa core library
//!
//! Foundational utilities shared by every docqa crate:
//! - Error handling (`RagError`, `RagResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, EmptyContextPolicy};
pub use error::{RagError, RagResult};
