//! Mock speech capabilities shared by the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use counselor_agent::{VoiceSession, VoiceSessionEvent};
use counselor_config::VoiceConfig;
use counselor_core::{
    CaptureErrorKind, CaptureSink, SpeechCapture, SpeechRequest, SpeechSynthesis,
    SynthesisErrorKind, SynthesisSink, VoiceInfo,
};
use tokio::sync::broadcast;

/// Capability call, in the order it was made
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CaptureStart(u64),
    CaptureStop,
    CaptureRelease,
    Speak(u64),
    SynthesisCancel,
    SynthesisRelease,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn count(log: &CallLog, call: &Call) -> usize {
    log.lock().iter().filter(|c| *c == call).count()
}

pub fn position(log: &CallLog, call: &Call) -> Option<usize> {
    log.lock().iter().position(|c| c == call)
}

/// Speech capture that records calls and can replay scripted answers
pub struct MockCapture {
    supported: bool,
    log: CallLog,
    sink: Mutex<Option<CaptureSink>>,
    fail_start: Mutex<Option<CaptureErrorKind>>,
    fail_every_start: Option<CaptureErrorKind>,
    no_speech: bool,
    answers: Mutex<VecDeque<String>>,
}

impl MockCapture {
    pub fn new(log: CallLog) -> Self {
        Self {
            supported: true,
            log,
            sink: Mutex::new(None),
            fail_start: Mutex::new(None),
            fail_every_start: None,
            no_speech: false,
            answers: Mutex::new(VecDeque::new()),
        }
    }

    pub fn unsupported(log: CallLog) -> Self {
        Self {
            supported: false,
            ..Self::new(log)
        }
    }

    /// Each start emits `Started` and the next answer as a final transcript
    pub fn with_answers<I, S>(self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.answers.lock().extend(answers.into_iter().map(Into::into));
        self
    }

    /// Runs without a scripted answer report no speech
    pub fn no_speech(mut self) -> Self {
        self.no_speech = true;
        self
    }

    /// Every start fails synchronously with `kind`
    pub fn failing(mut self, kind: CaptureErrorKind) -> Self {
        self.fail_every_start = Some(kind);
        self
    }

    pub fn fail_next_start(&self, kind: CaptureErrorKind) {
        *self.fail_start.lock() = Some(kind);
    }

    /// Sink of the most recent capture run
    pub fn sink(&self) -> CaptureSink {
        self.sink.lock().clone().expect("capture was never started")
    }
}

impl SpeechCapture for MockCapture {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&self, _language: &str, sink: CaptureSink) -> Result<(), CaptureErrorKind> {
        if let Some(kind) = self.fail_start.lock().take().or(self.fail_every_start.clone()) {
            return Err(kind);
        }
        self.log.lock().push(Call::CaptureStart(sink.generation()));
        if let Some(answer) = self.answers.lock().pop_front() {
            sink.started();
            sink.final_transcript(answer);
        } else if self.no_speech {
            sink.started();
            sink.error(CaptureErrorKind::NoSpeech);
        }
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        self.log.lock().push(Call::CaptureStop);
        // Platforms report a stop as an aborted run
        if let Some(sink) = self.sink.lock().as_ref() {
            sink.error(CaptureErrorKind::Aborted);
            sink.ended();
        }
    }

    fn release(&self) {
        self.log.lock().push(Call::CaptureRelease);
    }
}

/// Speech synthesis that records requests
pub struct MockSynthesis {
    supported: bool,
    log: CallLog,
    voices: Vec<VoiceInfo>,
    /// `voices()` returns nothing until it has been polled this many times
    ready_after: u32,
    polls: Mutex<u32>,
    auto_end: bool,
    playing: Mutex<Option<SynthesisSink>>,
    requests: Mutex<Vec<SpeechRequest>>,
}

impl MockSynthesis {
    pub fn new(log: CallLog) -> Self {
        Self {
            supported: true,
            log,
            voices: vec![
                VoiceInfo::new("en-us-1", "Samantha", "en-US"),
                VoiceInfo::new("es-mx-1", "Paulina", "es-MX"),
            ],
            ready_after: 1,
            polls: Mutex::new(0),
            auto_end: false,
            playing: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unsupported(log: CallLog) -> Self {
        Self {
            supported: false,
            ..Self::new(log)
        }
    }

    pub fn with_voices(mut self, voices: Vec<VoiceInfo>) -> Self {
        self.voices = voices;
        self
    }

    pub fn ready_after(mut self, polls: u32) -> Self {
        self.ready_after = polls;
        self
    }

    /// Every utterance reports start and end right away
    pub fn auto_end(mut self) -> Self {
        self.auto_end = true;
        self
    }

    pub fn polls(&self) -> u32 {
        *self.polls.lock()
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().clone()
    }

    /// Sink of the utterance still playing
    pub fn sink(&self) -> SynthesisSink {
        self.playing.lock().clone().expect("nothing is playing")
    }
}

impl SpeechSynthesis for MockSynthesis {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        let mut polls = self.polls.lock();
        *polls += 1;
        if *polls >= self.ready_after {
            self.voices.clone()
        } else {
            Vec::new()
        }
    }

    fn speak(&self, request: SpeechRequest, sink: SynthesisSink) -> Result<(), SynthesisErrorKind> {
        self.log.lock().push(Call::Speak(sink.utterance()));
        self.requests.lock().push(request);
        sink.started();
        if self.auto_end {
            sink.ended();
        } else {
            *self.playing.lock() = Some(sink);
        }
        Ok(())
    }

    fn cancel(&self) {
        self.log.lock().push(Call::SynthesisCancel);
        // Cancelling reports the cut-off utterance as interrupted
        if let Some(sink) = self.playing.lock().take() {
            sink.error(SynthesisErrorKind::Interrupted);
        }
    }

    fn release(&self) {
        self.log.lock().push(Call::SynthesisRelease);
    }
}

pub fn voice_config(hands_free: bool) -> VoiceConfig {
    VoiceConfig {
        hands_free,
        preferred_language: "es-CO".to_string(),
        ..VoiceConfig::default()
    }
}

pub fn open(
    config: VoiceConfig,
    capture: &Arc<MockCapture>,
    synthesis: &Arc<MockSynthesis>,
) -> VoiceSession {
    VoiceSession::open("test", config, capture.clone(), synthesis.clone())
        .expect("mock capabilities are supported")
}

/// Everything broadcast so far
pub fn drain(rx: &mut broadcast::Receiver<VoiceSessionEvent>) -> Vec<VoiceSessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
