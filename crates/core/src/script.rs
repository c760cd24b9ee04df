//! Scripts: the fixed, ordered question list driving a conversation
//!
//! A script is immutable once built. Ordinals are 1-based and contiguous,
//! and no two questions target the same field.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::fields::{FieldKind, FieldName};

/// Script construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("Question ordinals must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguousOrdinals { expected: usize, found: usize },

    #[error("Field {0} is targeted by more than one question")]
    DuplicateField(FieldName),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Question {0} has empty text")]
    EmptyQuestion(usize),
}

/// One scripted question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// 1-based position in the script
    pub ordinal: usize,
    /// Text shown or spoken to the user
    pub text: String,
    /// Field the answer fills
    pub field: FieldName,
}

impl Question {
    /// Parser family applied to the answer
    pub fn kind(&self) -> FieldKind {
        self.field.kind()
    }
}

/// Ordered, immutable question list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    id: String,
    questions: Vec<Question>,
}

impl Script {
    /// Build a script from `(field, text)` pairs, numbering them in order
    pub fn new<I, S>(id: impl Into<String>, entries: I) -> Result<Self, ScriptError>
    where
        I: IntoIterator<Item = (FieldName, S)>,
        S: Into<String>,
    {
        let questions = entries
            .into_iter()
            .enumerate()
            .map(|(idx, (field, text))| Question {
                ordinal: idx + 1,
                text: text.into(),
                field,
            })
            .collect();
        Self::from_questions(id, questions)
    }

    /// Build a script from explicit questions, validating the invariants
    ///
    /// Questions are sorted by ordinal before validation.
    pub fn from_questions(
        id: impl Into<String>,
        mut questions: Vec<Question>,
    ) -> Result<Self, ScriptError> {
        questions.sort_by_key(|q| q.ordinal);

        let mut seen = HashSet::new();
        for (idx, question) in questions.iter().enumerate() {
            let expected = idx + 1;
            if question.ordinal != expected {
                return Err(ScriptError::NonContiguousOrdinals {
                    expected,
                    found: question.ordinal,
                });
            }
            if question.text.trim().is_empty() {
                return Err(ScriptError::EmptyQuestion(question.ordinal));
            }
            if !seen.insert(question.field) {
                return Err(ScriptError::DuplicateField(question.field));
            }
        }

        Ok(Self {
            id: id.into(),
            questions,
        })
    }

    /// Personal financial profile interview
    pub fn financial_profile() -> Self {
        Self::new(
            "financial_profile",
            [
                (FieldName::FullName, "Para empezar, ¿cuál es tu nombre completo?"),
                (FieldName::Age, "¿Cuántos años tienes?"),
                (FieldName::MaritalStatus, "¿Cuál es tu estado civil?"),
                (FieldName::Dependents, "¿Cuántas personas dependen económicamente de ti?"),
                (FieldName::Occupation, "¿A qué te dedicas actualmente?"),
                (FieldName::MonthlyIncome, "¿Cuál es tu ingreso mensual aproximado?"),
            ],
        )
        .expect("built-in profile script is valid")
    }

    /// Monthly budget interview
    pub fn budget() -> Self {
        Self::new(
            "budget",
            [
                (FieldName::MonthlyIncome, "¿Cuánto recibes al mes en total?"),
                (FieldName::HousingExpense, "¿Cuánto pagas al mes por vivienda (arriendo o cuota)?"),
                (FieldName::FoodExpense, "¿Cuánto gastas al mes en alimentación?"),
                (FieldName::TransportExpense, "¿Cuánto gastas al mes en transporte?"),
                (FieldName::DebtPayments, "¿Cuánto destinas al mes a pagar deudas?"),
                (FieldName::SavingsGoal, "¿Cuánto te gustaría ahorrar cada mes?"),
            ],
        )
        .expect("built-in budget script is valid")
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question at a 1-based ordinal
    pub fn question(&self, ordinal: usize) -> Option<&Question> {
        ordinal
            .checked_sub(1)
            .and_then(|idx| self.questions.get(idx))
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Question targeting a field, if the script asks for it
    pub fn question_for(&self, field: FieldName) -> Option<&Question> {
        self.questions.iter().find(|q| q.field == field)
    }
}
