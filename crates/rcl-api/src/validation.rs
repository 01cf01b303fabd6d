//! Field validation shared by the category, deck, card and quiz routes.

use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

/// Maximum length of category and deck names, in characters
pub const MAX_NAME_LEN: usize = 100;

/// Maximum length of free-text descriptions, in characters
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Maximum length of either side of a card, in characters
pub const MAX_CARD_TEXT_LEN: usize = 10_000;

/// Maximum length of a submitted quiz answer, in characters
pub const MAX_ANSWER_LEN: usize = 2000;

/// Trim a name and check it is between 1 and [`MAX_NAME_LEN`] characters.
///
/// # Examples
/// ```
/// use rcl_api::validation::validate_name;
///
/// assert_eq!(validate_name("Deck", "  Spanish verbs ").unwrap(), "Spanish verbs");
/// assert!(validate_name("Deck", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> Result<String, ApiError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} name cannot be empty")));
    }

    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "{field} name must be at most {MAX_NAME_LEN} characters long"
        )));
    }

    Ok(trimmed.to_string())
}

/// Trim an optional description. Blank descriptions become `None`.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(trimmed) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };

    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::Validation(format!(
            "Description must be at most {MAX_DESCRIPTION_LEN} characters long"
        )));
    }

    Ok(Some(trimmed.to_string()))
}

/// Check one side of a card. The text is stored as given, surrounding whitespace
/// included, so markdown indentation survives.
pub fn validate_card_text(side: &str, text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::Validation(format!("Card {side} cannot be empty")));
    }

    if text.chars().count() > MAX_CARD_TEXT_LEN {
        return Err(ApiError::Validation(format!(
            "Card {side} must be at most {MAX_CARD_TEXT_LEN} characters long"
        )));
    }

    Ok(())
}

pub fn validate_answer(answer: &str) -> Result<(), ApiError> {
    if answer.chars().count() > MAX_ANSWER_LEN {
        return Err(ApiError::Validation(format!(
            "Answers must be at most {MAX_ANSWER_LEN} characters long"
        )));
    }

    Ok(())
}

/// Resolve an optional count against a default and an inclusive range.
pub fn validate_count(
    field: &str,
    value: Option<u32>,
    default: u32,
    max: u32,
) -> Result<u32, ApiError> {
    let value = value.unwrap_or(default);

    if value == 0 || value > max {
        return Err(ApiError::Validation(format!(
            "{field} must be between 1 and {max}"
        )));
    }

    Ok(value)
}

/// Deserialize a PATCH field where an absent key and an explicit `null` differ.
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: a missing key stays `None`, `null` becomes `Some(None)`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
