//! Small text helpers shared by field lookup and the parsers

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase and strip diacritics ("Explicación" -> "explicacion")
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a free-form label into identifier shape
///
/// Folds case and accents, and treats runs of spaces, hyphens and
/// underscores as a single `_`.
pub fn normalize_label(label: &str) -> String {
    fold(label.trim())
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}
