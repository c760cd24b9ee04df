//! Currency amounts in whole units
//!
//! Answers arrive colloquially ("10 millones", "$1.500.000", "22", "800 mil
//! pesos", "3 mil millones"). Magnitude words win over bare numbers,
//! checked from the largest down. A bare number below [`ASSUME_MILLIONS_BELOW`] is read as
//! millions: people answer "22" meaning 22.000.000. That rule cannot tell
//! a literal 22 apart and is kept on purpose.

use once_cell::sync::Lazy;
use regex::Regex;

use counselor_core::text::fold;

/// Bare numbers under this are taken to be millions
pub const ASSUME_MILLIONS_BELOW: f64 = 1_000.0;

const MAX_AMOUNT: f64 = 1e15;

#[derive(Debug, Clone, Copy)]
enum Magnitude {
    Thousand,
    Million,
    Billion,
}

impl Magnitude {
    fn value(&self) -> f64 {
        match self {
            Magnitude::Thousand => 1_000.0,
            Magnitude::Million => 1_000_000.0,
            Magnitude::Billion => 1_000_000_000.0,
        }
    }
}

static CURRENCY_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$€£]|\b(?:pesos?|cop|usd|eur|euros?|dolares?|dollars?)\b").unwrap()
});

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").unwrap());

static GROUPED_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(?:[.,]\d{3})+$").unwrap());

// Order matters: largest magnitude first, "mil millones" before both of its words
static MAGNITUDE_PATTERNS: Lazy<Vec<(Regex, Magnitude)>> = Lazy::new(|| vec![
    (
        Regex::new(r"(\d+(?:[.,]\d+)*)\s*(?:mil\s+millones|mil\s+millon|billions?)\b").unwrap(),
        Magnitude::Billion,
    ),
    (
        Regex::new(r"(\d+(?:[.,]\d+)*)\s*(?:millones|millon|millions?|mill|mm)\b").unwrap(),
        Magnitude::Million,
    ),
    (
        Regex::new(r"(\d+(?:[.,]\d+)*)\s*(?:mil|thousand|k)\b").unwrap(),
        Magnitude::Thousand,
    ),
]);

/// Parse a currency answer into whole units
///
/// Returns the amount and the parser's confidence, or `None` when the text
/// has no digits.
pub fn parse_currency(text: &str) -> Option<(i64, f32)> {
    let folded = fold(text);
    let cleaned = CURRENCY_NOISE.replace_all(&folded, " ");

    for (pattern, magnitude) in MAGNITUDE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(&cleaned) else {
            continue;
        };
        let Some(mantissa) = caps.get(1).and_then(|m| parse_number_token(m.as_str())) else {
            continue;
        };
        return to_whole_units(mantissa * magnitude.value()).map(|amount| (amount, 0.95));
    }

    let token = NUMBER.find(&cleaned)?;
    let number = parse_number_token(token.as_str())?;

    if number < ASSUME_MILLIONS_BELOW {
        tracing::debug!(
            number = number,
            "Bare currency amount below threshold, reading as millions"
        );
        to_whole_units(number * Magnitude::Million.value()).map(|amount| (amount, 0.6))
    } else {
        to_whole_units(number).map(|amount| (amount, 0.85))
    }
}

/// Interpret one number token
///
/// `1.500.000` and `1,500` are grouped integers. Otherwise the last `.` or
/// `,` is the decimal mark (`5.5`, `2,5`, `1.234,56`).
fn parse_number_token(token: &str) -> Option<f64> {
    if GROUPED_INTEGER.is_match(token) {
        return token.replace(['.', ','], "").parse().ok();
    }

    match token.rfind(['.', ',']) {
        None => token.parse().ok(),
        Some(idx) => {
            let integer: String = token[..idx].chars().filter(char::is_ascii_digit).collect();
            let fraction = &token[idx + 1..];
            format!("{}.{}", integer, fraction).parse().ok()
        },
    }
}

fn to_whole_units(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount > MAX_AMOUNT {
        tracing::debug!(amount = amount, "Skipping currency amount - unreasonably large");
        return None;
    }
    Some(amount.round() as i64)
}
