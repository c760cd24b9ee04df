//! Offline text generator
//!
//! Walks the script on its own: greets, asks the next question after each
//! user turn and closes once every question has been answered. Replies
//! queued with [`ScriptedGenerator::push_reply`] are returned first, which
//! lets tests inject update blocks or odd phrasing; queued failures
//! stand in for an unreachable model.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use counselor_core::{Result, Script, TextGenerator, Transcript};

use crate::LlmError;

const MODEL_NAME: &str = "scripted";

enum Queued {
    Reply(String),
    Failure(String),
}

pub struct ScriptedGenerator {
    script: Script,
    queued: Mutex<VecDeque<Queued>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            queued: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue replies returned before falling back to the script
    pub fn with_replies<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queued
            .lock()
            .extend(replies.into_iter().map(|r| Queued::Reply(r.into())));
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.queued.lock().push_back(Queued::Reply(reply.into()));
    }

    /// Fail the next generation with `reason`
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.queued.lock().push_back(Queued::Failure(reason.into()));
    }

    /// Prompts received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn next_scripted_reply(&self, transcript: &Transcript) -> String {
        let answered = transcript.user_turn_count();
        match self.script.question(answered + 1) {
            Some(question) if answered == 0 => format!(
                "¡Hola! Voy a hacerte unas preguntas para armar tu perfil financiero. {}",
                question.text
            ),
            Some(question) => format!("Gracias. {}", question.text),
            None => "¡Listo! Ya tengo lo que necesito. Revisemos juntos tu presupuesto.".to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, transcript: &Transcript) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());

        let queued = self.queued.lock().pop_front();
        let reply = match queued {
            Some(Queued::Reply(reply)) => reply,
            Some(Queued::Failure(reason)) => {
                tracing::warn!(reason = %reason, "Scripted generation failure");
                return Err(LlmError::Generation(reason).into());
            },
            None => self.next_scripted_reply(transcript),
        };

        if reply.trim().is_empty() {
            return Err(LlmError::EmptyResponse(MODEL_NAME.to_string()).into());
        }

        tracing::debug!(
            user_turns = transcript.user_turn_count(),
            chars = reply.len(),
            "Scripted reply"
        );
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use counselor_core::{Error, Turn};

    #[tokio::test]
    async fn test_walks_the_script() {
        let generator = ScriptedGenerator::new(Script::financial_profile());
        let mut transcript = Transcript::new();

        let greeting = generator.generate("p", &transcript).await.unwrap();
        assert!(greeting.contains("nombre completo"));

        transcript.push(Turn::assistant(greeting));
        transcript.push(Turn::user("Ana Gómez"));
        let reply = generator.generate("p", &transcript).await.unwrap();
        assert!(reply.contains("¿Cuántos años tienes?"));
        assert_eq!(generator.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_closes_after_last_question() {
        let generator = ScriptedGenerator::new(Script::budget());
        let transcript: Transcript = (0..6).map(|i| Turn::user(format!("{}", i + 1))).collect();
        let reply = generator.generate("p", &transcript).await.unwrap();
        assert!(reply.starts_with("¡Listo!"));
    }

    #[tokio::test]
    async fn test_queued_replies_come_first() {
        let generator =
            ScriptedGenerator::new(Script::budget()).with_replies(["primera", "  "]);
        let transcript = Transcript::new();

        assert_eq!(generator.generate("p", &transcript).await.unwrap(), "primera");
        let err = generator.generate("p", &transcript).await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(generator
            .generate("p", &transcript)
            .await
            .unwrap()
            .contains("¿Cuánto recibes al mes"));
    }

    #[tokio::test]
    async fn test_queued_failure_surfaces_as_generation_error() {
        let generator = ScriptedGenerator::new(Script::budget());
        generator.push_failure("modelo no disponible");
        let transcript = Transcript::new();

        let err = generator.generate("p", &transcript).await.unwrap_err();
        match err {
            Error::Generation(message) => assert!(message.contains("modelo no disponible")),
            other => panic!("unexpected error: {:?}", other),
        }
        // Only the queued call fails
        assert!(generator.generate("p", &transcript).await.is_ok());
        assert_eq!(generator.prompts().len(), 2);
    }
}
