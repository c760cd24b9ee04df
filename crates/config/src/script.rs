//! Question scripts loaded from YAML
//!
//! ```yaml
//! id: budget
//! questions:
//!   - field: monthly_income
//!     text: "¿Cuánto recibes al mes en total?"
//!   - field: gasto en vivienda
//!     text: "¿Cuánto pagas de arriendo?"
//! ```
//!
//! `field` accepts a field id or its Spanish label. `ordinal` is optional;
//! when omitted, questions are numbered in file order.

use counselor_core::{FieldName, Question, Script, ScriptError};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ConfigError;

/// One question as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    #[serde(default)]
    pub ordinal: Option<usize>,
    pub field: String,
    pub text: String,
}

/// Script as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    pub id: String,
    #[serde(default)]
    pub questions: Vec<QuestionConfig>,
}

impl ScriptConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_yaml_str(&content)
    }

    /// Validate and build the immutable script
    pub fn into_script(self) -> Result<Script, ConfigError> {
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(idx, q)| {
                let field = FieldName::from_label(&q.field)
                    .ok_or_else(|| ScriptError::UnknownField(q.field.clone()))?;
                Ok(Question {
                    ordinal: q.ordinal.unwrap_or(idx + 1),
                    text: q.text,
                    field,
                })
            })
            .collect::<Result<Vec<_>, ScriptError>>()?;

        let script = Script::from_questions(self.id, questions)?;
        tracing::debug!(script = script.id(), questions = script.len(), "Loaded script");
        Ok(script)
    }
}

/// Resolve a script by built-in name or YAML path
pub fn resolve_script(name: &str, path: Option<&str>) -> Result<Script, ConfigError> {
    if let Some(path) = path {
        return ScriptConfig::from_file(path)?.into_script();
    }
    match name {
        "financial_profile" | "profile" => Ok(Script::financial_profile()),
        "budget" => Ok(Script::budget()),
        other => Err(ConfigError::InvalidValue {
            field: "conversation.script".to_string(),
            message: format!(
                "Unknown built-in script '{}' (expected financial_profile or budget)",
                other
            ),
        }),
    }
}
