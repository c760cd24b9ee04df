//! AI collaborator integration
//!
//! - Prompt construction for the counselor persona, including the
//!   field-update marker contract
//! - [`ScriptedGenerator`], an offline [`TextGenerator`] used by the CLI and tests
//!
//! The network transport to a hosted model is not part of this crate; any
//! client implementing [`TextGenerator`] can be plugged in.
//!
//! [`TextGenerator`]: counselor_core::TextGenerator

pub mod prompt;
pub mod scripted;

pub use prompt::{Message, PromptBuilder, Role};
pub use scripted::ScriptedGenerator;

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

impl From<LlmError> for counselor_core::Error {
    fn from(err: LlmError) -> Self {
        counselor_core::Error::Generation(err.to_string())
    }
}
