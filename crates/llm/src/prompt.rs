//! Prompt Building
//!
//! Constructs prompts for the financial counselor.

use serde::{Deserialize, Serialize};
use std::fmt;

use counselor_core::{ProfileRecord, Question, Script, Speaker, Transcript};
use counselor_text_processing::{UPDATE_HEADER, UPDATE_TERMINATOR};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

impl From<Speaker> for Role {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::User => Role::User,
            Speaker::Assistant => Role::Assistant,
        }
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Prompt builder for the counselor
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persona, conversation rules and the field-update contract
    pub fn system_prompt(mut self, script: &Script) -> Self {
        let fields = script
            .questions()
            .iter()
            .map(|q| format!("- {} ({})", q.field.display_label(), q.field))
            .collect::<Vec<_>>()
            .join("\n");

        let system = format!(
            r#"Eres un asesor financiero cercano y paciente. Ayudas a la persona a construir su perfil financiero y su presupuesto mensual.

## Cómo conversar
- Haz una sola pregunta a la vez, en el orden del guion
- Respuestas breves (2 o 3 frases), sin tablas ni viñetas: pueden leerse en voz alta
- Si la respuesta no es clara, vuelve a preguntar con otras palabras
- Los montos están en pesos; "22" suele significar 22 millones

## Datos que estás recopilando
{fields}

## Corrección de datos
Solo cuando la persona pida cambiar un dato ya registrado, agrega al final de tu respuesta exactamente este bloque:
{header}
Campo: <identificador del campo>
Valor anterior: <valor registrado>
Valor nuevo: <valor nuevo>
Explicación: <por qué cambia>
{terminator}
No uses el bloque para datos nuevos ni para campos fuera de la lista."#,
            fields = fields,
            header = UPDATE_HEADER,
            terminator = UPDATE_TERMINATOR,
        );

        self.messages.push(Message::system(system));
        self
    }

    /// Data collected so far
    pub fn with_profile(mut self, profile: &ProfileRecord) -> Self {
        if !profile.is_empty() {
            let mut context = format!("## Perfil actual\n{}", profile.to_context_string());
            let expenses = profile.total_expenses();
            if expenses > 0 {
                context.push_str(&format!("\n- gastos registrados: {}", expenses));
            }
            self.messages.push(Message::system(context));
        }
        self
    }

    /// Next scripted question, or the closing instruction once complete
    pub fn with_question(mut self, question: Option<&Question>, completed: bool) -> Self {
        let guidance = match (question, completed) {
            (_, true) => "## Siguiente paso\nYa tienes todas las respuestas. Resume el perfil en pocas frases y ofrece una recomendación concreta.".to_string(),
            (Some(q), false) => format!(
                "## Siguiente pregunta (#{})\n{}",
                q.ordinal, q.text
            ),
            (None, false) => return self,
        };
        self.messages.push(Message::system(guidance));
        self
    }

    /// Tell the model its last correction was rejected
    pub fn with_rejected_update(mut self, reason: &str) -> Self {
        self.messages.push(Message::system(format!(
            "## Corrección rechazada\n{}. Pide a la persona que confirme el dato.",
            reason
        )));
        self
    }

    /// Most recent `max_turns` turns of the transcript
    pub fn with_history(mut self, transcript: &Transcript, max_turns: usize) -> Self {
        let turns = transcript.turns();
        let skip = turns.len().saturating_sub(max_turns);
        self.messages.extend(turns[skip..].iter().map(|turn| Message {
            role: turn.speaker.into(),
            content: turn.text.clone(),
        }));
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }

    /// Flatten into a single prompt string
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("[{}]\n{}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
