//! Collaborator traits
//!
//! The conversation engine talks to everything outside its core through
//! these seams, so hosted services and OS capabilities can be swapped or
//! mocked:
//!
//! ```text
//! Text generation:
//!   - TextGenerator: prompt + transcript -> assistant text
//!
//! Persistence:
//!   - ProfileStore: upsert partial records keyed by user
//!
//! Speech:
//!   - SpeechCapture: continuous speech-to-text
//!   - SpeechSynthesis: text-to-speech playback
//! ```

mod llm;
mod speech;
mod store;

pub use llm::TextGenerator;
pub use speech::{
    CapabilityEvent, CaptureErrorKind, CaptureEvent, CaptureSink, SpeechCapture, SpeechRequest,
    SpeechSynthesis, SynthesisErrorKind, SynthesisEvent, SynthesisSink, VoiceInfo,
};
pub use store::ProfileStore;
