//! Voice conversation loop
//!
//! Speaks every assistant message and feeds each final transcript to the
//! conversation as the user's turn. Only final transcripts reach the
//! conversation; interim hypotheses stay in the session.

use crate::conversation::{Conversation, TurnOutcome};
use crate::voice_session::{VoiceSession, VoiceSessionState, VoiceStep};
use crate::AgentError;

pub struct VoiceConversation {
    conversation: Conversation,
    voice: VoiceSession,
}

impl VoiceConversation {
    pub fn new(conversation: Conversation, voice: VoiceSession) -> Self {
        Self {
            conversation,
            voice,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn voice(&self) -> &VoiceSession {
        &self.voice
    }

    pub fn voice_mut(&mut self) -> &mut VoiceSession {
        &mut self.voice
    }

    /// Generate and speak the opening message
    pub async fn start(&mut self) -> Result<String, AgentError> {
        let greeting = self.conversation.start().await?;
        self.voice.speak(&greeting).await?;
        Ok(greeting)
    }

    /// Wait for one user utterance, answer it and start speaking the reply
    ///
    /// Listening starts on its own when the session is idle with nothing
    /// scheduled. Returns `None` when the session closed, or when capture
    /// could not start or ended without a transcript and nothing is scheduled.
    pub async fn run_turn(&mut self) -> Result<Option<TurnOutcome>, AgentError> {
        let mut listened = self.voice.state() == VoiceSessionState::Listening;
        loop {
            if self.voice.state() == VoiceSessionState::Idle && !self.voice.has_scheduled_resume()
            {
                if listened {
                    return Ok(None);
                }
                let started = self.voice.start_listening()?;
                if !started && !self.voice.has_scheduled_resume() {
                    return Ok(None);
                }
                listened = true;
                continue;
            }

            match self.voice.step().await {
                VoiceStep::Transcript(text) => {
                    let outcome = self.conversation.handle_user_input(&text).await?;
                    self.voice.speak(&outcome.reply).await?;
                    return Ok(Some(outcome));
                },
                VoiceStep::Continue => {},
                VoiceStep::Failed(err) => return Err(err.into()),
                VoiceStep::Closed => return Ok(None),
            }
        }
    }

    /// Run turns until the script is complete or a turn ends without a
    /// transcript
    ///
    /// In hands-free mode the session resumes listening by itself, so a turn
    /// only comes back empty once the session closed or capture could not
    /// run. In push-to-talk mode an empty turn hands control back to the
    /// caller, which calls `run` or `run_turn` again when the user asks.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        if self.conversation.transcript().is_empty() {
            self.start().await?;
        }

        while !self.conversation.is_complete() {
            if self.run_turn().await?.is_none() {
                break;
            }
        }

        tracing::info!(
            conversation_id = %self.conversation.id(),
            completed = self.conversation.is_complete(),
            hands_free = self.voice.config().hands_free,
            "Voice conversation finished"
        );
        Ok(())
    }

    /// Close the voice session and hand back the conversation
    pub fn finish(mut self) -> Conversation {
        self.voice.close();
        self.conversation
    }
}
