//! Core traits and types for the financial counselor
//!
//! This crate provides foundational types used across all other crates:
//! - Conversation types (turns, append-only transcript)
//! - Scripts: the ordered question list driving a conversation
//! - Field definitions and typed field values
//! - Collaborator traits (text generation, persistence, speech capabilities)
//! - Error types

pub mod conversation;
pub mod error;
pub mod fields;
pub mod script;
pub mod text;
pub mod traits;

pub use conversation::{Speaker, Transcript, Turn};
pub use error::{Error, Result};
pub use fields::{
    FieldKind, FieldName, FieldValue, MaritalStatus, ParsedField, PartialRecord, ProfileRecord,
};
pub use script::{Question, Script, ScriptError};

pub use traits::{
    CapabilityEvent, CaptureErrorKind, CaptureEvent, CaptureSink, ProfileStore, SpeechCapture,
    SpeechRequest, SpeechSynthesis, SynthesisErrorKind, SynthesisEvent, SynthesisSink,
    TextGenerator, VoiceInfo,
};
