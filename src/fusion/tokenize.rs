use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::core::model::Token;

static WORD: OnceLock<Regex> = OnceLock::new();

fn word_pattern() -> &'static Regex {
    WORD.get_or_init(|| Regex::new(r"\w+").unwrap())
}

/// Composes to NFC and case-folds, so equivalent spellings compare equal.
fn fold(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

/// Splits a reading into lower-cased word tokens, dropping punctuation.
pub fn tokenize(text: &str) -> Vec<Token> {
    let folded = fold(text);
    word_pattern()
        .find_iter(&folded)
        .enumerate()
        .map(|(index, m)| Token {
            text: m.as_str().to_string(),
            index,
        })
        .collect()
}
