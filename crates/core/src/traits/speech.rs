//! Speech capability traits
//!
//! Both capabilities are non-blocking: `start`/`speak` return as soon as the
//! request is issued and everything that happens afterwards (interim and
//! final transcripts, playback start and end, errors) is posted as a
//! [`CapabilityEvent`] through the sink handed to the call. The voice
//! session consumes those events from a single channel.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Event posted by a capability into the voice session's channel
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityEvent {
    /// Event from the capture run started with `generation`
    Capture { generation: u64, event: CaptureEvent },
    /// Event from the utterance identified by `utterance`
    Synthesis { utterance: u64, event: SynthesisEvent },
}

/// Speech-to-text events
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// Microphone is live
    Started,
    /// Non-final hypothesis
    Interim(String),
    /// Final transcript for the utterance
    Final(String),
    /// Capture failed
    Error(CaptureErrorKind),
    /// Capture stopped (for any reason)
    Ended,
}

/// Text-to-speech events
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisEvent {
    /// Audio playback actually began
    Started,
    /// Playback finished normally
    Ended,
    /// Playback failed or was cut short
    Error(SynthesisErrorKind),
}

/// Capture failure categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// Nothing was said before the recognizer gave up
    NoSpeech,
    /// Microphone permission denied by the user or the platform
    NotAllowed,
    /// Recognition service unreachable
    Network,
    /// Capture was stopped on purpose
    Aborted,
    /// No usable microphone
    AudioCapture,
    /// Anything else, with the platform's code
    Other(String),
}

impl CaptureErrorKind {
    /// Map a platform error code (Web Speech naming) to a category
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "no-speech" | "no_speech" => CaptureErrorKind::NoSpeech,
            "not-allowed" | "not_allowed" | "service-not-allowed" | "permission-denied" => {
                CaptureErrorKind::NotAllowed
            },
            "network" => CaptureErrorKind::Network,
            "aborted" => CaptureErrorKind::Aborted,
            "audio-capture" | "audio_capture" => CaptureErrorKind::AudioCapture,
            other => CaptureErrorKind::Other(other.to_string()),
        }
    }

    /// Side effect of the session's own control flow, never shown
    pub fn is_benign(&self) -> bool {
        matches!(self, CaptureErrorKind::Aborted)
    }
}

/// Synthesis failure categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisErrorKind {
    /// Utterance removed from the queue by a cancel
    Canceled,
    /// Utterance cut off mid-playback by a cancel
    Interrupted,
    /// Audio output device busy
    AudioBusy,
    /// Network voice unavailable
    Network,
    /// Anything else, with the platform's code
    Other(String),
}

impl SynthesisErrorKind {
    /// Map a platform error code (Web Speech naming) to a category
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "canceled" | "cancelled" => SynthesisErrorKind::Canceled,
            "interrupted" => SynthesisErrorKind::Interrupted,
            "audio-busy" | "audio_busy" => SynthesisErrorKind::AudioBusy,
            "network" => SynthesisErrorKind::Network,
            other => SynthesisErrorKind::Other(other.to_string()),
        }
    }

    /// Expected result of cancelling playback, not a failure
    pub fn is_benign(&self) -> bool {
        matches!(self, SynthesisErrorKind::Canceled | SynthesisErrorKind::Interrupted)
    }
}

/// A synthesis voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    /// BCP-47 tag, e.g. "es-CO"
    pub language: String,
    /// Platform default voice
    #[serde(default)]
    pub is_default: bool,
}

impl VoiceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            is_default: false,
        }
    }

    /// Whether the voice speaks `language` ("es" matches "es-CO")
    pub fn speaks(&self, language: &str) -> bool {
        let ours = self.language.to_ascii_lowercase();
        let wanted = language.to_ascii_lowercase();
        ours == wanted || ours.split(['-', '_']).next() == Some(wanted.as_str())
    }
}

/// One request to vocalize text
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub language: String,
    /// `None` means the platform default voice
    pub voice: Option<VoiceInfo>,
    /// Playback rate (1.0 = normal)
    pub rate: f32,
}

/// Handle a capture run uses to report events
#[derive(Debug, Clone)]
pub struct CaptureSink {
    generation: u64,
    tx: mpsc::UnboundedSender<CapabilityEvent>,
}

impl CaptureSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<CapabilityEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn started(&self) {
        self.send(CaptureEvent::Started);
    }

    pub fn interim(&self, text: impl Into<String>) {
        self.send(CaptureEvent::Interim(text.into()));
    }

    pub fn final_transcript(&self, text: impl Into<String>) {
        self.send(CaptureEvent::Final(text.into()));
    }

    pub fn error(&self, kind: CaptureErrorKind) {
        self.send(CaptureEvent::Error(kind));
    }

    pub fn ended(&self) {
        self.send(CaptureEvent::Ended);
    }

    fn send(&self, event: CaptureEvent) {
        let event = CapabilityEvent::Capture {
            generation: self.generation,
            event,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(generation = self.generation, "Voice session closed, capture event dropped");
        }
    }
}

/// Handle an utterance uses to report events
#[derive(Debug, Clone)]
pub struct SynthesisSink {
    utterance: u64,
    tx: mpsc::UnboundedSender<CapabilityEvent>,
}

impl SynthesisSink {
    pub fn new(utterance: u64, tx: mpsc::UnboundedSender<CapabilityEvent>) -> Self {
        Self { utterance, tx }
    }

    pub fn utterance(&self) -> u64 {
        self.utterance
    }

    pub fn started(&self) {
        self.send(SynthesisEvent::Started);
    }

    pub fn ended(&self) {
        self.send(SynthesisEvent::Ended);
    }

    pub fn error(&self, kind: SynthesisErrorKind) {
        self.send(SynthesisEvent::Error(kind));
    }

    fn send(&self, event: SynthesisEvent) {
        let event = CapabilityEvent::Synthesis {
            utterance: self.utterance,
            event,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(utterance = self.utterance, "Voice session closed, synthesis event dropped");
        }
    }
}

/// Continuous speech-to-text capability
///
/// `stop` and `release` must be idempotent: the session and the user may
/// both issue them.
pub trait SpeechCapture: Send + Sync + 'static {
    /// Feature detection: is speech capture available at all
    fn is_supported(&self) -> bool;

    /// Begin continuous capture; acquires the microphone on first use
    fn start(&self, language: &str, sink: CaptureSink) -> Result<(), CaptureErrorKind>;

    /// Stop the current capture run
    fn stop(&self);

    /// Release the microphone handle
    fn release(&self);
}

/// Text-to-speech playback capability
pub trait SpeechSynthesis: Send + Sync + 'static {
    /// Feature detection: is speech synthesis available at all
    fn is_supported(&self) -> bool;

    /// Currently loaded voices; may be empty until the platform finishes loading
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Queue an utterance; the `Started` signal arrives later through the sink
    fn speak(&self, request: SpeechRequest, sink: SynthesisSink) -> Result<(), SynthesisErrorKind>;

    /// Cancel current and queued playback
    fn cancel(&self);

    /// Release the audio output handle
    fn release(&self);
}
