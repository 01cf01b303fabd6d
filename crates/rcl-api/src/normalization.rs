//! Answer normalization for quiz grading.
//!
//! Before a quiz answer is sent to the language model it is compared with the
//! expected answer locally. Exact matches after normalization are accepted
//! without a model call.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Punctuation that can be dropped between words without changing meaning.
/// Next to a digit even these count, so `3.14` never equals `314`.
const PROSE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '\'', '"', '\u{2019}', '\u{201C}', '\u{201D}', '¿', '¡', '(',
    ')',
];

/// Normalize a string for answer comparison.
///
/// Lowercases, expands common ligatures (`ß`, `æ`, `œ`), strips accents via NFD
/// decomposition, drops punctuation, and collapses whitespace. `"Café!"` and
/// `"cafe"` normalize identically; `"chat"` and `"chats"` do not.
pub fn normalize_for_comparison(s: &str) -> String {
    s.to_lowercase()
        .replace('ß', "ss")
        .replace('æ', "ae")
        .replace('œ', "oe")
        .nfd()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Symbols that carry meaning and are lost by [`normalize_for_comparison`]:
/// signs, operators, decimal points and anything that is not prose punctuation.
fn significant_marks(s: &str) -> String {
    let chars: Vec<char> = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    let next_to_digit = |i: usize| {
        let before = i.checked_sub(1).and_then(|j| chars.get(j));
        [before, chars.get(i + 1)]
            .into_iter()
            .flatten()
            .any(char::is_ascii_digit)
    };

    chars
        .iter()
        .enumerate()
        .filter(|&(_, c)| !c.is_alphanumeric() && !c.is_whitespace())
        .filter(|&(i, c)| next_to_digit(i) || !PROSE_PUNCTUATION.contains(c))
        .map(|(_, c)| *c)
        .collect()
}

/// Whether a submitted answer matches the expected one after normalization.
///
/// Answers that normalize to nothing never match, even against each other.
/// Both sides must also agree on their significant symbols, so `-5` and `5`
/// or `C` and `C++` are left for the model to judge.
pub fn answers_match(given: &str, expected: &str) -> bool {
    let normalized = normalize_for_comparison(given);
    !normalized.is_empty()
        && normalized == normalize_for_comparison(expected)
        && significant_marks(given) == significant_marks(expected)
}

/// An answer with no letters or digits, e.g. `""` or `"?!"`.
pub fn is_blank_answer(answer: &str) -> bool {
    normalize_for_comparison(answer).is_empty()
}
