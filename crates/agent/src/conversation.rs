//! Conversation loop
//!
//! One `Conversation` drives a script to completion. Each user turn goes
//! through the same pipeline:
//!
//! 1. append the user turn
//! 2. parse the answer with the parser of the question it answers, merge and persist
//! 3. recompute progress and build the prompt
//! 4. generate the reply, apply or reject any correction block in it
//! 5. append the visible reply
//!
//! The transcript and profile are owned here and only mutated by these
//! methods.

use std::sync::Arc;
use tokio::sync::broadcast;

use counselor_config::ConversationConfig;
use counselor_core::{
    FieldName, FieldValue, ParsedField, PartialRecord, ProfileRecord, ProfileStore, Script,
    TextGenerator, Transcript, Turn,
};
use counselor_llm::PromptBuilder;
use counselor_text_processing::{
    parse_field, parse_update_instruction, strip_update_block, UpdateOutcome,
};

use crate::progress::{advance, answered_question, pending_question, Progress};
use crate::AgentError;

/// Spoken when a reply held nothing but a correction block
const ACKNOWLEDGEMENT: &str = "Entendido.";

/// Per-conversation behavior
#[derive(Debug, Clone)]
pub struct ConversationOptions {
    /// Owner of the persisted record
    pub user_id: String,
    /// Apply correction blocks found in AI replies
    pub apply_ai_updates: bool,
    /// Turns of history included in each prompt
    pub history_turns: usize,
}

impl Default for ConversationOptions {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            apply_ai_updates: true,
            history_turns: 20,
        }
    }
}

impl From<&ConversationConfig> for ConversationOptions {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            user_id: config.user_id.clone(),
            apply_ai_updates: config.apply_ai_updates,
            history_turns: config.history_turns,
        }
    }
}

/// Conversation events
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    /// An answer filled its field
    FieldCaptured(ParsedField),
    /// An AI correction replaced a field value
    FieldUpdated {
        field: FieldName,
        previous: Option<FieldValue>,
        value: FieldValue,
    },
    /// An AI correction was rejected
    UpdateRejected { reason: String },
    /// An answer could not be parsed; the field stays empty
    ParseMissed { field: FieldName },
    /// Every question has been answered
    Completed,
}

/// What one user turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Reply to show or speak, without any correction block
    pub reply: String,
    /// Field filled by the user's answer
    pub captured: Option<ParsedField>,
    /// Field whose answer could not be parsed
    pub parse_missed: Option<FieldName>,
    /// Result of scanning the AI reply for a correction
    pub update: UpdateOutcome,
    pub progress: Progress,
    /// First persistence failure of the turn, if any
    pub persistence_error: Option<String>,
}

/// A scripted counseling conversation
pub struct Conversation {
    id: String,
    script: Script,
    transcript: Transcript,
    profile: ProfileRecord,
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn ProfileStore>,
    options: ConversationOptions,
    /// Reason the last correction was rejected, told to the AI on the next turn
    rejected_update: Option<String>,
    completion_announced: bool,
    event_tx: broadcast::Sender<ConversationEvent>,
}

impl Conversation {
    pub fn new(
        script: Script,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn ProfileStore>,
        options: ConversationOptions,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            script,
            transcript: Transcript::new(),
            profile: ProfileRecord::new(),
            generator,
            store,
            options,
            rejected_update: None,
            completion_announced: false,
            event_tx,
        }
    }

    /// Subscribe to conversation events
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.event_tx.subscribe()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn profile(&self) -> &ProfileRecord {
        &self.profile
    }

    pub fn options(&self) -> &ConversationOptions {
        &self.options
    }

    pub fn progress(&self) -> Progress {
        advance(&self.transcript, &self.script)
    }

    pub fn is_complete(&self) -> bool {
        self.progress().completed
    }

    /// Generate the opening message and append it
    pub async fn start(&mut self) -> Result<String, AgentError> {
        let progress = self.progress();
        let prompt = self.build_prompt(progress);
        let reply = self.generator.generate(&prompt, &self.transcript).await?;
        let visible = self.visible_reply(&reply);
        self.transcript.push(Turn::assistant(visible.clone()));

        tracing::info!(
            conversation_id = %self.id,
            script = self.script.id(),
            model = self.generator.model_name(),
            "Conversation started"
        );
        Ok(visible)
    }

    /// Run one user turn through the pipeline
    pub async fn handle_user_input(&mut self, text: &str) -> Result<TurnOutcome, AgentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::EmptyInput);
        }

        self.transcript.push(Turn::user(text));
        let mut persistence_error = None;

        // Dispatch to the question that was pending before this turn
        let mut captured = None;
        let mut parse_missed = None;
        if let Some(field) = answered_question(&self.transcript, &self.script).map(|q| q.field) {
            match parse_field(field, text) {
                Some(parsed) => {
                    let (partial, _) = self.profile.merge(&parsed);
                    if let Err(e) = self.persist(&partial).await {
                        persistence_error.get_or_insert(e);
                    }
                    let _ = self.event_tx.send(ConversationEvent::FieldCaptured(parsed.clone()));
                    captured = Some(parsed);
                },
                None => {
                    let _ = self.event_tx.send(ConversationEvent::ParseMissed { field });
                    parse_missed = Some(field);
                },
            }
        }

        let progress = self.progress();
        let prompt = self.build_prompt(progress);
        let reply = self.generator.generate(&prompt, &self.transcript).await?;

        let update = if self.options.apply_ai_updates {
            parse_update_instruction(&reply)
        } else {
            UpdateOutcome::NoUpdate
        };
        match &update {
            UpdateOutcome::Applied(validated) => {
                let (partial, previous) = self.profile.merge(&validated.parsed);
                if let Err(e) = self.persist(&partial).await {
                    persistence_error.get_or_insert(e);
                }
                tracing::info!(
                    conversation_id = %self.id,
                    field = %validated.parsed.field,
                    explanation = %validated.instruction.explanation,
                    "Applied AI correction"
                );
                let _ = self.event_tx.send(ConversationEvent::FieldUpdated {
                    field: validated.parsed.field,
                    previous,
                    value: validated.parsed.value.clone(),
                });
            },
            UpdateOutcome::NoUpdate => {},
            rejected => {
                if let Some(reason) = rejected.reason() {
                    let _ = self.event_tx.send(ConversationEvent::UpdateRejected {
                        reason: reason.clone(),
                    });
                    self.rejected_update = Some(reason);
                }
            },
        }

        let visible = self.visible_reply(&reply);
        self.transcript.push(Turn::assistant(visible.clone()));

        if progress.completed && !self.completion_announced {
            self.completion_announced = true;
            tracing::info!(
                conversation_id = %self.id,
                fields = self.profile.len(),
                "Script completed"
            );
            let _ = self.event_tx.send(ConversationEvent::Completed);
        }

        metrics::counter!("counselor_turns_total", "script" => self.script.id().to_string())
            .increment(1);
        tracing::debug!(
            conversation_id = %self.id,
            current = progress.current,
            completed = progress.completed,
            captured = captured.is_some(),
            update = update.as_str(),
            "Turn processed"
        );

        Ok(TurnOutcome {
            reply: visible,
            captured,
            parse_missed,
            update,
            progress,
            persistence_error,
        })
    }

    fn build_prompt(&mut self, progress: Progress) -> String {
        let mut builder = PromptBuilder::new()
            .system_prompt(&self.script)
            .with_profile(&self.profile)
            .with_question(
                pending_question(&self.transcript, &self.script),
                progress.completed,
            );
        if let Some(reason) = self.rejected_update.take() {
            builder = builder.with_rejected_update(&reason);
        }
        builder
            .with_history(&self.transcript, self.options.history_turns)
            .render()
    }

    fn visible_reply(&self, reply: &str) -> String {
        let visible = strip_update_block(reply);
        if visible.is_empty() {
            ACKNOWLEDGEMENT.to_string()
        } else {
            visible
        }
    }

    /// Upsert fields; failures are logged and reported, never fatal
    async fn persist(&self, record: &PartialRecord) -> Result<(), String> {
        if record.is_empty() {
            return Ok(());
        }
        self.store
            .upsert(&self.options.user_id, record)
            .await
            .map_err(|e| {
                tracing::warn!(
                    conversation_id = %self.id,
                    error = %e,
                    "Failed to persist profile fields"
                );
                e.to_string()
            })
    }
}
