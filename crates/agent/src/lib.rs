//! Conversational agent for the financial counselor
//!
//! Features:
//! - Script progress tracking and answer dispatch
//! - Conversation loop: parse answers, persist fields, apply AI corrections
//! - Voice session with strict listen/speak turn-taking
//! - Voice conversation loop composing both

pub mod conversation;
pub mod progress;
pub mod store;
pub mod voice_loop;
pub mod voice_session;

pub use conversation::{Conversation, ConversationEvent, ConversationOptions, TurnOutcome};
pub use progress::{advance, answered_question, parser_for, pending_question, Progress};
pub use store::InMemoryProfileStore;
pub use voice_loop::VoiceConversation;
pub use voice_session::{
    VoiceError, VoiceNotice, VoiceSession, VoiceSessionEvent, VoiceSessionState, VoiceStep,
};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Empty user input")]
    EmptyInput,
}

impl From<counselor_core::Error> for AgentError {
    fn from(err: counselor_core::Error) -> Self {
        match err {
            counselor_core::Error::Generation(msg) => AgentError::Generation(msg),
            counselor_core::Error::Persistence(msg) => AgentError::Persistence(msg),
        }
    }
}
