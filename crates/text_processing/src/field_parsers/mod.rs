//! Field parsers
//!
//! Each parser turns one free-form answer into a typed value for a single
//! field. Parsers are total: malformed input yields `None` so the caller can
//! ask again. They are pure and do not depend on locale or clock.
//!
//! Patterns are compiled once with `once_cell::sync::Lazy`. Matching runs
//! on accent-folded lowercase text, so "Unión Libre" and "union libre" are
//! the same answer.

mod currency;

use once_cell::sync::Lazy;
use regex::Regex;

use counselor_core::text::fold;
use counselor_core::{FieldKind, FieldName, FieldValue, MaritalStatus, ParsedField};

pub use currency::{parse_currency, ASSUME_MILLIONS_BELOW};

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

// First match wins; multi-word synonyms come first
static MARITAL_SYNONYMS: &[(&str, MaritalStatus)] = &[
    ("union libre", MaritalStatus::DomesticPartnership),
    ("union marital", MaritalStatus::DomesticPartnership),
    ("pareja de hecho", MaritalStatus::DomesticPartnership),
    ("domestic partner", MaritalStatus::DomesticPartnership),
    ("common law", MaritalStatus::DomesticPartnership),
    ("concubinato", MaritalStatus::DomesticPartnership),
    ("divorciado", MaritalStatus::Divorced),
    ("divorciada", MaritalStatus::Divorced),
    ("divorced", MaritalStatus::Divorced),
    ("separado", MaritalStatus::Separated),
    ("separada", MaritalStatus::Separated),
    ("separated", MaritalStatus::Separated),
    ("viudo", MaritalStatus::Widowed),
    ("viuda", MaritalStatus::Widowed),
    ("widow", MaritalStatus::Widowed),
    ("casado", MaritalStatus::Married),
    ("casada", MaritalStatus::Married),
    ("married", MaritalStatus::Married),
    ("soltero", MaritalStatus::Single),
    ("soltera", MaritalStatus::Single),
    ("single", MaritalStatus::Single),
];

static NO_DEPENDENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:no tengo|ninguno|ninguna|nadie|cero|none|no one|nobody)\b").unwrap()
});

static NUMBER_WORDS: &[(&str, u8)] = &[
    ("un", 1),
    ("uno", 1),
    ("una", 1),
    ("dos", 2),
    ("tres", 3),
    ("cuatro", 4),
    ("cinco", 5),
    ("seis", 6),
    ("siete", 7),
    ("ocho", 8),
    ("nueve", 9),
    ("diez", 10),
];

const MAX_DEPENDENTS: u32 = 20;

/// Age in years, accepted only within 18..=100
pub fn parse_age(text: &str) -> Option<(u8, f32)> {
    let age = first_integer(text)?;
    if !(18..=100).contains(&age) {
        tracing::debug!(age = age, "Age outside accepted range");
        return None;
    }
    Some((age as u8, 0.9))
}

/// Marital status from the first synonym found in the answer
pub fn parse_marital_status(text: &str) -> Option<(MaritalStatus, f32)> {
    let folded = fold(text);
    MARITAL_SYNONYMS
        .iter()
        .find(|(synonym, _)| folded.contains(synonym))
        .map(|(_, status)| (*status, 0.9))
}

/// Number of dependents, 0..=20
///
/// Negations ("no tengo hijos", "ninguno") are zero. Spanish number words
/// are only consulted when the answer has no digits.
pub fn parse_dependents(text: &str) -> Option<(u8, f32)> {
    let folded = fold(text);

    if NO_DEPENDENTS.is_match(&folded) {
        return Some((0, 0.9));
    }

    if let Some(count) = first_integer(&folded) {
        if count > MAX_DEPENDENTS {
            tracing::debug!(count = count, "Dependent count outside accepted range");
            return None;
        }
        return Some((count as u8, 0.9));
    }

    folded
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|token| {
            NUMBER_WORDS
                .iter()
                .find(|(word, _)| *word == token)
                .map(|(_, n)| *n)
        })
        .map(|count| (count, 0.75))
}

/// Proper name, each token title-cased
pub fn parse_name(text: &str) -> Option<(String, f32)> {
    let name = text
        .split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        return None;
    }
    Some((name, 0.8))
}

/// Free text, trimmed with inner whitespace collapsed
pub fn parse_text(text: &str) -> Option<(String, f32)> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some((collapsed, 0.8))
}

/// Run the parser family `kind` on `text`
pub fn parse_value(kind: FieldKind, text: &str) -> Option<(FieldValue, f32)> {
    match kind {
        FieldKind::Currency => parse_currency(text).map(|(v, c)| (FieldValue::Currency(v), c)),
        FieldKind::Age => parse_age(text).map(|(v, c)| (FieldValue::Age(v), c)),
        FieldKind::MaritalStatus => {
            parse_marital_status(text).map(|(v, c)| (FieldValue::MaritalStatus(v), c))
        },
        FieldKind::Dependents => parse_dependents(text).map(|(v, c)| (FieldValue::Dependents(v), c)),
        FieldKind::Name => parse_name(text).map(|(v, c)| (FieldValue::Name(v), c)),
        FieldKind::Text => parse_text(text).map(|(v, c)| (FieldValue::Text(v), c)),
    }
}

/// Parse an answer for `field` using the parser its kind selects
pub fn parse_field(field: FieldName, text: &str) -> Option<ParsedField> {
    let kind = field.kind();
    match parse_value(kind, text) {
        Some((value, confidence)) => Some(ParsedField::new(field, value, confidence)),
        None => {
            metrics::counter!("counselor_parse_miss_total", "kind" => kind.as_str()).increment(1);
            tracing::debug!(field = %field, kind = kind.as_str(), "No value found in answer");
            None
        },
    }
}

fn first_integer(text: &str) -> Option<u32> {
    INTEGER.find(text).and_then(|m| m.as_str().parse().ok())
}

fn title_case(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_in_range() {
        assert_eq!(parse_age("tengo 34 años").map(|(a, _)| a), Some(34));
        assert_eq!(parse_age("18").map(|(a, _)| a), Some(18));
        assert_eq!(parse_age("cumplí 100 el mes pasado").map(|(a, _)| a), Some(100));
        for age in 18..=100u32 {
            let text = format!("pues tengo {} años cumplidos", age);
            assert_eq!(parse_age(&text).map(|(a, _)| a as u32), Some(age));
        }
    }

    #[test]
    fn test_age_out_of_range() {
        assert_eq!(parse_age("tengo 150 años"), None);
        assert_eq!(parse_age("17"), None);
        assert_eq!(parse_age("no te voy a decir"), None);
    }

    #[test]
    fn test_marital_status() {
        let status = |t: &str| parse_marital_status(t).map(|(s, _)| s);
        assert_eq!(status("Soltera"), Some(MaritalStatus::Single));
        assert_eq!(status("vivo en Unión Libre"), Some(MaritalStatus::DomesticPartnership));
        assert_eq!(status("estoy casado hace 5 años"), Some(MaritalStatus::Married));
        assert_eq!(status("divorciada"), Some(MaritalStatus::Divorced));
        assert_eq!(status("VIUDO"), Some(MaritalStatus::Widowed));
        assert_eq!(status("separada de hecho"), Some(MaritalStatus::Separated));
        assert_eq!(status("married"), Some(MaritalStatus::Married));
        assert_eq!(status("es complicado"), None);
    }

    #[test]
    fn test_dependents_negations() {
        let count = |t: &str| parse_dependents(t).map(|(n, _)| n);
        assert_eq!(count("no tengo hijos"), Some(0));
        assert_eq!(count("Ninguno"), Some(0));
        assert_eq!(count("cero"), Some(0));
        assert_eq!(count("nadie depende de mí"), Some(0));
    }

    #[test]
    fn test_dependents_numbers() {
        let count = |t: &str| parse_dependents(t).map(|(n, _)| n);
        assert_eq!(count("tengo 3"), Some(3));
        assert_eq!(count("0"), Some(0));
        assert_eq!(count("20"), Some(20));
        assert_eq!(count("25"), None);
        assert_eq!(count("tengo dos hijas"), Some(2));
        assert_eq!(count("solo una"), Some(1));
        assert_eq!(count("varios"), None);
    }

    #[test]
    fn test_name_title_case() {
        assert_eq!(
            parse_name("  maría   JOSÉ pérez ").map(|(n, _)| n),
            Some("María José Pérez".to_string())
        );
        assert_eq!(parse_name("   "), None);
        assert!(parse_name("x").is_some());
    }

    #[test]
    fn test_text_collapses_whitespace() {
        assert_eq!(
            parse_text(" ingeniera   de\tsistemas ").map(|(t, _)| t),
            Some("ingeniera de sistemas".to_string())
        );
        assert_eq!(parse_text(""), None);
    }

    #[test]
    fn test_parse_field_dispatches_by_kind() {
        let parsed = parse_field(FieldName::MonthlyIncome, "4 millones").unwrap();
        assert_eq!(parsed.field, FieldName::MonthlyIncome);
        assert_eq!(parsed.value, FieldValue::Currency(4_000_000));

        let parsed = parse_field(FieldName::Dependents, "ninguna").unwrap();
        assert_eq!(parsed.value, FieldValue::Dependents(0));

        assert!(parse_field(FieldName::Age, "mucho").is_none());
    }

    #[test]
    fn test_parsers_never_panic_on_odd_input() {
        let inputs = ["", " ", "🙂🙂", "$$$", "..,,", "99999999999999999999999", "\u{0301}"];
        for input in inputs {
            for field in FieldName::ALL {
                let _ = parse_field(field, input);
            }
        }
    }
}
