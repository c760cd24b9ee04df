//! Field-update instructions embedded in AI replies
//!
//! When the counselor decides the user wants to correct a profile field it
//! appends a marker block to its reply:
//!
//! ```text
//! [ACTUALIZAR_CAMPO]
//! Campo: ingreso mensual
//! Valor anterior: 3 millones
//! Valor nuevo: 4.5 millones
//! Explicación: El usuario recibió un aumento
//! y quiere reflejarlo en su presupuesto.
//! [/ACTUALIZAR_CAMPO]
//! ```
//!
//! The terminator is optional; without it the block runs to the end of the
//! text. Labels are matched ignoring case and accents, and the English
//! labels (`Field`, `Previous value`, `New value`, `Explanation`) are
//! accepted too. The explanation may span several lines and stops at the
//! next recognized label.
//!
//! This parser is the trust boundary between generated text and stored
//! data: unknown fields and values the field parser rejects come back as
//! explicit outcomes, never as silent drops.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use counselor_core::text::normalize_label;
use counselor_core::{FieldName, ParsedField};

use crate::field_parsers::parse_field;

/// Header line opening an update block
pub const UPDATE_HEADER: &str = "[ACTUALIZAR_CAMPO]";
/// Optional line closing an update block
pub const UPDATE_TERMINATOR: &str = "[/ACTUALIZAR_CAMPO]";

/// Raw instruction as written by the AI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInstruction {
    /// Field label exactly as written
    pub field_label: String,
    pub previous_value: String,
    pub new_value: String,
    pub explanation: String,
}

/// Instruction whose field is known and whose new value parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedUpdate {
    pub instruction: UpdateInstruction,
    pub parsed: ParsedField,
}

/// Result of scanning one AI reply
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// No (well-formed) update block; the normal case
    NoUpdate,
    /// Block names a field outside the known set
    InvalidField { field: String },
    /// Field is known but the new value could not be parsed
    UnparsableValue { field: FieldName, value: String },
    /// Ready to merge and persist
    Applied(ValidatedUpdate),
}

impl UpdateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOutcome::NoUpdate => "no_update",
            UpdateOutcome::InvalidField { .. } => "invalid_field",
            UpdateOutcome::UnparsableValue { .. } => "unparsable_value",
            UpdateOutcome::Applied(_) => "applied",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }

    /// Explanation of a rejected instruction, suitable for logs and the user
    pub fn reason(&self) -> Option<String> {
        match self {
            UpdateOutcome::InvalidField { field } => {
                Some(format!("'{}' is not a known profile field", field))
            },
            UpdateOutcome::UnparsableValue { field, value } => Some(format!(
                "'{}' is not a valid {} value for {}",
                value,
                field.kind().as_str(),
                field
            )),
            UpdateOutcome::NoUpdate | UpdateOutcome::Applied(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Field,
    PreviousValue,
    NewValue,
    Explanation,
}

impl Label {
    fn classify(raw: &str) -> Option<Label> {
        match normalize_label(strip_decoration(raw)).as_str() {
            "campo" | "field" => Some(Label::Field),
            "valor_anterior" | "previous_value" | "old_value" => Some(Label::PreviousValue),
            "valor_nuevo" | "new_value" => Some(Label::NewValue),
            "explicacion" | "explanation" => Some(Label::Explanation),
            _ => None,
        }
    }
}

/// Line ranges of a located block
struct BlockSpan {
    /// Lines between header and terminator
    body: Range<usize>,
    /// Header through terminator, inclusive
    whole: Range<usize>,
}

/// Scan an AI reply for an update block and validate it
pub fn parse_update_instruction(text: &str) -> UpdateOutcome {
    let lines: Vec<&str> = text.lines().collect();
    let Some(span) = locate_block(&lines) else {
        return UpdateOutcome::NoUpdate;
    };

    let outcome = match read_instruction(&lines[span.body]) {
        Some(instruction) => validate(instruction),
        None => {
            tracing::warn!("Update block is missing required labels, ignoring it");
            UpdateOutcome::NoUpdate
        },
    };

    metrics::counter!("counselor_update_instructions_total", "outcome" => outcome.as_str())
        .increment(1);
    if let Some(reason) = outcome.reason() {
        tracing::warn!(outcome = outcome.as_str(), reason = %reason, "Rejected update instruction");
    }
    outcome
}

/// Extract the raw instruction without validating it
pub fn extract_instruction(text: &str) -> Option<UpdateInstruction> {
    let lines: Vec<&str> = text.lines().collect();
    let span = locate_block(&lines)?;
    read_instruction(&lines[span.body])
}

/// Check the field against the known set and parse the new value
pub fn validate(instruction: UpdateInstruction) -> UpdateOutcome {
    let Some(field) = FieldName::from_label(&instruction.field_label) else {
        return UpdateOutcome::InvalidField {
            field: instruction.field_label,
        };
    };

    match parse_field(field, &instruction.new_value) {
        Some(parsed) => UpdateOutcome::Applied(ValidatedUpdate {
            instruction,
            parsed,
        }),
        None => UpdateOutcome::UnparsableValue {
            field,
            value: instruction.new_value,
        },
    }
}

/// The reply with any update block removed, for display and speech
pub fn strip_update_block(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some(span) = locate_block(&lines) else {
        return text.trim().to_string();
    };

    lines[..span.whole.start]
        .iter()
        .chain(&lines[span.whole.end..])
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn locate_block(lines: &[&str]) -> Option<BlockSpan> {
    let header = lines.iter().position(|line| is_marker(line, "[actualizar_campo]", "[update_field]"))?;
    let body_start = header + 1;

    let terminator = lines[body_start..]
        .iter()
        .position(|line| is_marker(line, "[/actualizar_campo]", "[/update_field]"))
        .map(|offset| body_start + offset);

    Some(match terminator {
        Some(end) => BlockSpan {
            body: body_start..end,
            whole: header..end + 1,
        },
        None => BlockSpan {
            body: body_start..lines.len(),
            whole: header..lines.len(),
        },
    })
}

fn read_instruction(body: &[&str]) -> Option<UpdateInstruction> {
    let mut field = None;
    let mut previous = None;
    let mut new_value = None;
    let mut explanation: Option<Vec<String>> = None;
    let mut current = None;

    for line in body {
        if let Some((label, value)) = split_label(line) {
            let value = clean_value(value);
            match label {
                Label::Field => field = Some(value),
                Label::PreviousValue => previous = Some(value),
                Label::NewValue => new_value = Some(value),
                Label::Explanation => explanation = Some(vec![value]),
            }
            current = Some(label);
            continue;
        }

        // Only the explanation continues past its own line
        if current == Some(Label::Explanation) {
            if let Some(parts) = explanation.as_mut() {
                parts.push(line.trim().to_string());
            }
        }
    }

    let field = field.filter(|f| !f.is_empty())?;
    let new_value = new_value.filter(|v| !v.is_empty())?;

    Some(UpdateInstruction {
        field_label: field,
        previous_value: previous?,
        new_value,
        explanation: explanation?.join("\n").trim().to_string(),
    })
}

fn split_label(line: &str) -> Option<(Label, &str)> {
    let (raw, rest) = line.split_once(':')?;
    Some((Label::classify(raw)?, rest))
}

fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| c == '*' || c == '`')
        .trim()
        .to_string()
}

fn is_marker(line: &str, spanish: &str, english: &str) -> bool {
    let normalized = normalize_label(strip_decoration(line));
    normalized == spanish || normalized == english
}

/// Drop markdown emphasis and list bullets the AI sometimes adds
fn strip_decoration(text: &str) -> &str {
    text.trim()
        .trim_start_matches(['-', '•'])
        .trim_matches(|c: char| c == '*' || c == '`' || c.is_whitespace())
}
