//! Voice Session
//!
//! Owns the speech capture and synthesis capabilities and enforces strict
//! turn-taking between them: the session is listening or speaking, never
//! both.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  CaptureSink    ┌──────────────┐  broadcast   ┌──────────┐
//! │   Capture   │───────────────▶│              │─────────────▶│   UI     │
//! └─────────────┘                 │ VoiceSession │              └──────────┘
//! ┌─────────────┐  SynthesisSink  │  step/handle │  VoiceStep   ┌──────────┐
//! │  Synthesis  │───────────────▶│              │─────────────▶│   Loop   │
//! └─────────────┘                 └──────────────┘              └──────────┘
//! ```
//!
//! Capabilities never call back into the session. They post events into a
//! single channel and the session applies them one at a time in
//! [`VoiceSession::step`]. Every capture run and utterance carries an id;
//! events from runs the session has already stopped or cancelled are
//! dropped, so a cancellation the session asked for never looks like a
//! failure.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, sleep_until, Instant};

use counselor_config::VoiceConfig;
use counselor_core::{
    CapabilityEvent, CaptureErrorKind, CaptureEvent, CaptureSink, SpeechCapture, SpeechRequest,
    SpeechSynthesis, SynthesisErrorKind, SynthesisEvent, SynthesisSink, VoiceInfo,
};

/// Voice session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceSessionState {
    /// Neither capturing nor speaking
    Idle,
    /// Capturing user speech
    Listening,
    /// Playing back a reply
    Speaking,
}

/// Errors surfaced to the user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    #[error("Voice mode unsupported: {0}")]
    Unsupported(String),

    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Speech capture failed: {0}")]
    Capture(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Voice session closed")]
    Closed,
}

impl VoiceError {
    /// Actionable message for the user
    pub fn user_message(&self) -> String {
        match self {
            VoiceError::Unsupported(what) => format!(
                "Tu navegador no permite {}. Usa Chrome o Edge, o continúa por texto.",
                what
            ),
            VoiceError::PermissionDenied => "No tengo permiso para usar el micrófono. \
                 Actívalo en la configuración del navegador y recarga la página."
                .to_string(),
            VoiceError::Capture(_) => {
                "No pude escucharte. Revisa tu micrófono y tu conexión, o escribe tu respuesta."
                    .to_string()
            },
            VoiceError::Synthesis(_) => {
                "No pude leer la respuesta en voz alta; la tienes por escrito.".to_string()
            },
            VoiceError::Closed => "El modo de voz está apagado.".to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            VoiceError::Unsupported(_) => "unsupported",
            VoiceError::PermissionDenied => "permission_denied",
            VoiceError::Capture(_) => "capture",
            VoiceError::Synthesis(_) => "synthesis",
            VoiceError::Closed => "closed",
        }
    }
}

impl From<CaptureErrorKind> for VoiceError {
    fn from(kind: CaptureErrorKind) -> Self {
        match kind {
            CaptureErrorKind::NotAllowed => VoiceError::PermissionDenied,
            CaptureErrorKind::NoSpeech => VoiceError::Capture("no speech detected".to_string()),
            CaptureErrorKind::Network => VoiceError::Capture("network unavailable".to_string()),
            CaptureErrorKind::Aborted => VoiceError::Capture("aborted".to_string()),
            CaptureErrorKind::AudioCapture => {
                VoiceError::Capture("no microphone available".to_string())
            },
            CaptureErrorKind::Other(code) => VoiceError::Capture(code),
        }
    }
}

impl From<SynthesisErrorKind> for VoiceError {
    fn from(kind: SynthesisErrorKind) -> Self {
        let reason = match kind {
            SynthesisErrorKind::Canceled => "canceled".to_string(),
            SynthesisErrorKind::Interrupted => "interrupted".to_string(),
            SynthesisErrorKind::AudioBusy => "audio output busy".to_string(),
            SynthesisErrorKind::Network => "network voice unavailable".to_string(),
            SynthesisErrorKind::Other(code) => code,
        };
        VoiceError::Synthesis(reason)
    }
}

/// Transient conditions worth telling the user about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceNotice {
    NoSpeechDetected,
    RetryingAfterNetworkError,
    DefaultVoiceUsed,
}

impl VoiceNotice {
    pub fn message(&self) -> &'static str {
        match self {
            VoiceNotice::NoSpeechDetected => "No te escuché. Habla cuando quieras.",
            VoiceNotice::RetryingAfterNetworkError => {
                "Se perdió la conexión con el reconocimiento de voz. Reintentando…"
            },
            VoiceNotice::DefaultVoiceUsed => {
                "No encontré una voz para tu idioma; usaré la voz predeterminada."
            },
        }
    }
}

/// Voice session events
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceSessionEvent {
    /// State changed
    StateChanged {
        old: VoiceSessionState,
        new: VoiceSessionState,
    },
    /// Non-final hypothesis, for display only
    InterimTranscript { text: String },
    /// Final transcript of a user utterance
    FinalTranscript { text: String },
    /// Playback actually began
    SpeakingStarted,
    /// Playback finished normally
    SpeakingEnded,
    /// Playback cut short by the user
    Interrupted,
    Notice(VoiceNotice),
    Error(VoiceError),
    Closed,
}

/// Result of one [`VoiceSession::step`]
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceStep {
    /// The user finished an utterance
    Transcript(String),
    /// Something happened; nothing for the caller to do
    Continue,
    /// A failure the user has to act on
    Failed(VoiceError),
    /// The session is closed
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerAction {
    /// Hands-free: listen again after playback or silence
    ResumeListening,
    /// Single retry after a network capture error
    RetryListening,
}

enum Wake {
    Event(Option<CapabilityEvent>),
    Timer,
}

/// Voice session for a single conversation
pub struct VoiceSession {
    session_id: String,
    config: VoiceConfig,
    capture: Arc<dyn SpeechCapture>,
    synthesis: Arc<dyn SpeechSynthesis>,
    state: VoiceSessionState,
    event_tx: broadcast::Sender<VoiceSessionEvent>,
    capability_tx: mpsc::UnboundedSender<CapabilityEvent>,
    capability_rx: mpsc::UnboundedReceiver<CapabilityEvent>,
    next_generation: u64,
    next_utterance: u64,
    /// Capture run whose events are still wanted
    active_capture: Option<u64>,
    /// Utterance whose events are still wanted
    active_utterance: Option<u64>,
    pending_interim: Option<String>,
    last_error: Option<VoiceError>,
    permission_denied: bool,
    network_failures: u32,
    default_voice_noticed: bool,
    timer: Option<(Instant, TimerAction)>,
    closed: bool,
}

impl VoiceSession {
    /// Open a session after feature-detecting both capabilities
    ///
    /// Neither handle is touched beyond `is_supported` until the first
    /// `start_listening` or `speak`.
    pub fn open(
        session_id: impl Into<String>,
        config: VoiceConfig,
        capture: Arc<dyn SpeechCapture>,
        synthesis: Arc<dyn SpeechSynthesis>,
    ) -> Result<Self, VoiceError> {
        let session_id = session_id.into();
        if !capture.is_supported() {
            tracing::warn!(session_id = %session_id, "Speech capture not supported");
            return Err(VoiceError::Unsupported("el reconocimiento de voz".to_string()));
        }
        if !synthesis.is_supported() {
            tracing::warn!(session_id = %session_id, "Speech synthesis not supported");
            return Err(VoiceError::Unsupported("la lectura en voz alta".to_string()));
        }

        let (event_tx, _) = broadcast::channel(100);
        let (capability_tx, capability_rx) = mpsc::unbounded_channel();

        tracing::debug!(
            session_id = %session_id,
            language = %config.preferred_language,
            hands_free = config.hands_free,
            "Voice session opened"
        );

        Ok(Self {
            session_id,
            config,
            capture,
            synthesis,
            state: VoiceSessionState::Idle,
            event_tx,
            capability_tx,
            capability_rx,
            next_generation: 0,
            next_utterance: 0,
            active_capture: None,
            active_utterance: None,
            pending_interim: None,
            last_error: None,
            permission_denied: false,
            network_failures: 0,
            default_voice_noticed: false,
            timer: None,
            closed: false,
        })
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<VoiceSessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> VoiceSessionState {
        self.state
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Latest interim hypothesis of the current capture run
    pub fn pending_interim(&self) -> Option<&str> {
        self.pending_interim.as_deref()
    }

    pub fn last_error(&self) -> Option<&VoiceError> {
        self.last_error.as_ref()
    }

    pub fn is_permission_denied(&self) -> bool {
        self.permission_denied
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// A resume or retry is waiting on its timer
    pub fn has_scheduled_resume(&self) -> bool {
        self.timer.is_some()
    }

    /// Start capturing user speech
    ///
    /// Playback is always cancelled first; the cancelled utterance's events
    /// are ignored. Returns `Ok(false)` when capture did not start and the
    /// failure was not fatal (no speech, aborted, first network error).
    pub fn start_listening(&mut self) -> Result<bool, VoiceError> {
        self.begin_listening(false)
    }

    fn begin_listening(&mut self, retry: bool) -> Result<bool, VoiceError> {
        if self.closed {
            return Err(VoiceError::Closed);
        }
        if self.permission_denied {
            return Err(VoiceError::PermissionDenied);
        }

        self.timer = None;
        self.active_utterance = None;
        self.synthesis.cancel();

        if self.active_capture.is_some() {
            self.set_state(VoiceSessionState::Listening);
            return Ok(true);
        }

        // A fresh run gets its own network retry
        if !retry {
            self.network_failures = 0;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        self.active_capture = Some(generation);
        self.pending_interim = None;

        let sink = CaptureSink::new(generation, self.capability_tx.clone());
        if let Err(kind) = self.capture.start(&self.config.preferred_language, sink) {
            self.active_capture = None;
            self.set_state(VoiceSessionState::Idle);
            tracing::warn!(session_id = %self.session_id, error = ?kind, "Capture failed to start");
            return match self.capture_failed(kind) {
                VoiceStep::Failed(err) => Err(err),
                _ => Ok(false),
            };
        }

        tracing::debug!(session_id = %self.session_id, generation, retry, "Listening");
        self.set_state(VoiceSessionState::Listening);
        Ok(true)
    }

    /// Stop capturing; safe to call in any state
    pub fn stop_listening(&mut self) {
        self.timer = None;
        if self.active_capture.take().is_some() {
            self.capture.stop();
        }
        if self.state == VoiceSessionState::Listening {
            self.set_state(VoiceSessionState::Idle);
        }
    }

    /// Speak `text`, stopping capture first
    ///
    /// Waits a bounded time for the voice list to load, prefers a voice for
    /// the configured language and otherwise uses the platform default.
    /// Returns once playback is requested; start and end arrive as events.
    pub async fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
        if self.closed {
            return Err(VoiceError::Closed);
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        self.timer = None;
        self.pending_interim = None;
        if self.active_capture.take().is_some() {
            self.capture.stop();
        }
        if self.active_utterance.take().is_some() {
            self.synthesis.cancel();
        }

        let voice = self.select_voice().await;

        self.next_utterance += 1;
        let utterance = self.next_utterance;
        self.active_utterance = Some(utterance);

        let request = SpeechRequest {
            text: text.to_string(),
            language: self.config.preferred_language.clone(),
            voice,
            rate: self.config.speech_rate,
        };
        let sink = SynthesisSink::new(utterance, self.capability_tx.clone());
        if let Err(kind) = self.synthesis.speak(request, sink) {
            self.active_utterance = None;
            self.set_state(VoiceSessionState::Idle);
            if kind.is_benign() {
                return Ok(());
            }
            let err = VoiceError::from(kind);
            self.surface(err.clone());
            return Err(err);
        }

        tracing::debug!(
            session_id = %self.session_id,
            utterance,
            chars = text.len(),
            "Speaking"
        );
        self.set_state(VoiceSessionState::Speaking);
        Ok(())
    }

    /// Cut playback short and listen right away
    pub fn interrupt(&mut self) -> Result<(), VoiceError> {
        if self.state != VoiceSessionState::Speaking {
            return Ok(());
        }
        tracing::debug!(session_id = %self.session_id, "Playback interrupted");
        let _ = self.event_tx.send(VoiceSessionEvent::Interrupted);
        self.start_listening().map(|_| ())
    }

    /// Wait for the next capability event or scheduled timer and apply it
    pub async fn step(&mut self) -> VoiceStep {
        if self.closed {
            return VoiceStep::Closed;
        }

        let wake = match self.timer {
            Some((deadline, _)) => tokio::select! {
                biased;
                event = self.capability_rx.recv() => Wake::Event(event),
                _ = sleep_until(deadline) => Wake::Timer,
            },
            None => Wake::Event(self.capability_rx.recv().await),
        };

        match wake {
            Wake::Event(Some(event)) => self.handle(event),
            Wake::Event(None) => VoiceStep::Closed,
            Wake::Timer => self.fire_timer(),
        }
    }

    /// Apply one capability event
    pub fn handle(&mut self, event: CapabilityEvent) -> VoiceStep {
        if self.closed {
            return VoiceStep::Closed;
        }
        match event {
            CapabilityEvent::Capture { generation, event } => {
                if self.active_capture != Some(generation) {
                    tracing::trace!(generation, event = ?event, "Dropping stale capture event");
                    return VoiceStep::Continue;
                }
                self.on_capture(event)
            },
            CapabilityEvent::Synthesis { utterance, event } => {
                if self.active_utterance != Some(utterance) {
                    tracing::trace!(utterance, event = ?event, "Dropping stale synthesis event");
                    return VoiceStep::Continue;
                }
                self.on_synthesis(event)
            },
        }
    }

    /// Stop everything and release both capabilities
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.timer = None;
        self.active_capture = None;
        self.active_utterance = None;
        self.pending_interim = None;

        self.capture.stop();
        self.synthesis.cancel();
        self.capture.release();
        self.synthesis.release();

        self.set_state(VoiceSessionState::Idle);
        let _ = self.event_tx.send(VoiceSessionEvent::Closed);
        tracing::debug!(session_id = %self.session_id, "Voice session closed");
    }

    fn on_capture(&mut self, event: CaptureEvent) -> VoiceStep {
        match event {
            CaptureEvent::Started => VoiceStep::Continue,
            CaptureEvent::Interim(text) => {
                self.network_failures = 0;
                self.pending_interim = Some(text.clone());
                let _ = self.event_tx.send(VoiceSessionEvent::InterimTranscript { text });
                VoiceStep::Continue
            },
            CaptureEvent::Final(text) => {
                self.network_failures = 0;
                self.active_capture = None;
                self.pending_interim = None;
                self.capture.stop();
                self.set_state(VoiceSessionState::Idle);

                let text = text.trim().to_string();
                if text.is_empty() {
                    self.schedule_resume();
                    return VoiceStep::Continue;
                }
                let _ = self.event_tx.send(VoiceSessionEvent::FinalTranscript { text: text.clone() });
                VoiceStep::Transcript(text)
            },
            CaptureEvent::Error(kind) => self.capture_failed(kind),
            CaptureEvent::Ended => {
                self.active_capture = None;
                if self.state == VoiceSessionState::Listening {
                    self.set_state(VoiceSessionState::Idle);
                    self.schedule_resume();
                }
                VoiceStep::Continue
            },
        }
    }

    fn capture_failed(&mut self, kind: CaptureErrorKind) -> VoiceStep {
        if kind.is_benign() {
            tracing::debug!(session_id = %self.session_id, "Capture aborted");
            return VoiceStep::Continue;
        }

        self.active_capture = None;
        if self.state == VoiceSessionState::Listening {
            self.set_state(VoiceSessionState::Idle);
        }

        match kind {
            CaptureErrorKind::NoSpeech => {
                self.notice(VoiceNotice::NoSpeechDetected);
                self.schedule_resume();
                VoiceStep::Continue
            },
            CaptureErrorKind::NotAllowed => {
                self.permission_denied = true;
                self.timer = None;
                self.surface(VoiceError::PermissionDenied);
                VoiceStep::Failed(VoiceError::PermissionDenied)
            },
            CaptureErrorKind::Network if self.network_failures == 0 => {
                self.network_failures = 1;
                self.notice(VoiceNotice::RetryingAfterNetworkError);
                self.timer = Some((
                    Instant::now() + self.config.network_retry_delay(),
                    TimerAction::RetryListening,
                ));
                VoiceStep::Continue
            },
            other => {
                self.network_failures = 0;
                let err = VoiceError::from(other);
                self.surface(err.clone());
                VoiceStep::Failed(err)
            },
        }
    }

    fn on_synthesis(&mut self, event: SynthesisEvent) -> VoiceStep {
        match event {
            SynthesisEvent::Started => {
                let _ = self.event_tx.send(VoiceSessionEvent::SpeakingStarted);
                VoiceStep::Continue
            },
            SynthesisEvent::Ended => {
                self.active_utterance = None;
                self.set_state(VoiceSessionState::Idle);
                let _ = self.event_tx.send(VoiceSessionEvent::SpeakingEnded);
                self.schedule_resume();
                VoiceStep::Continue
            },
            SynthesisEvent::Error(kind) if kind.is_benign() => {
                // Cancelled by someone other than this session
                self.active_utterance = None;
                if self.state == VoiceSessionState::Speaking {
                    self.set_state(VoiceSessionState::Idle);
                }
                VoiceStep::Continue
            },
            SynthesisEvent::Error(kind) => {
                self.active_utterance = None;
                self.set_state(VoiceSessionState::Idle);
                let err = VoiceError::from(kind);
                self.surface(err.clone());
                VoiceStep::Failed(err)
            },
        }
    }

    fn fire_timer(&mut self) -> VoiceStep {
        let Some((_, action)) = self.timer.take() else {
            return VoiceStep::Continue;
        };
        tracing::debug!(session_id = %self.session_id, action = ?action, "Timer fired");
        let result = match action {
            TimerAction::ResumeListening => self.begin_listening(false),
            TimerAction::RetryListening => self.begin_listening(true),
        };
        match result {
            Ok(_) => VoiceStep::Continue,
            Err(err) => VoiceStep::Failed(err),
        }
    }

    /// Hands-free only: listen again after the resume delay
    fn schedule_resume(&mut self) {
        if self.config.hands_free && !self.permission_denied {
            self.timer = Some((
                Instant::now() + self.config.resume_delay(),
                TimerAction::ResumeListening,
            ));
        }
    }

    async fn select_voice(&mut self) -> Option<VoiceInfo> {
        let attempts = self.config.voice_poll_attempts.max(1);
        let mut voices = self.synthesis.voices();
        let mut attempt = 1;
        while voices.is_empty() && attempt < attempts {
            sleep(self.config.voice_poll_interval()).await;
            voices = self.synthesis.voices();
            attempt += 1;
        }

        let language = self.config.preferred_language.as_str();
        let primary = language.split(['-', '_']).next().unwrap_or(language);
        let chosen = voices
            .iter()
            .find(|v| v.speaks(language))
            .or_else(|| voices.iter().find(|v| v.speaks(primary)))
            .cloned();

        if chosen.is_none() {
            tracing::warn!(
                session_id = %self.session_id,
                language = %language,
                available = voices.len(),
                "No matching synthesis voice, using platform default"
            );
            if !self.default_voice_noticed {
                self.default_voice_noticed = true;
                self.notice(VoiceNotice::DefaultVoiceUsed);
            }
        }
        chosen
    }

    fn notice(&self, notice: VoiceNotice) {
        tracing::info!(session_id = %self.session_id, notice = ?notice, "Voice notice");
        let _ = self.event_tx.send(VoiceSessionEvent::Notice(notice));
    }

    fn surface(&mut self, err: VoiceError) {
        metrics::counter!("counselor_voice_errors_total", "kind" => err.kind()).increment(1);
        tracing::warn!(session_id = %self.session_id, error = %err, "Voice error");
        self.last_error = Some(err.clone());
        let _ = self.event_tx.send(VoiceSessionEvent::Error(err));
    }

    fn set_state(&mut self, new_state: VoiceSessionState) {
        let old_state = std::mem::replace(&mut self.state, new_state);
        if old_state != new_state {
            let _ = self.event_tx.send(VoiceSessionEvent::StateChanged {
                old: old_state,
                new: new_state,
            });
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.close();
    }
}
