//! Account field checks shared by registration and profile updates.

use std::ops::RangeInclusive;

use validator::ValidateEmail;

use crate::error::ApiError;

const USERNAME_CHARS: RangeInclusive<usize> = 3..=30;
const PASSWORD_CHARS: RangeInclusive<usize> = 8..=128;

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}

/// Lowercase and trim an email before storing or looking it up
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    match email {
        "" => Err(invalid("Email cannot be empty")),
        _ if !email.validate_email() => Err(invalid("Invalid email format")),
        _ => Ok(()),
    }
}

/// Passwords need a letter and a digit, within the allowed length.
pub fn validate_password(password: &str) -> Result<(), ApiError> {
    let chars = password.chars().count();
    if !PASSWORD_CHARS.contains(&chars) {
        return Err(invalid(format!(
            "Password must be between {} and {} characters long",
            PASSWORD_CHARS.start(),
            PASSWORD_CHARS.end()
        )));
    }

    let letter = password.chars().any(char::is_alphabetic);
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if letter && digit {
        Ok(())
    } else {
        Err(invalid("Password must contain at least one letter and one number"))
    }
}

/// Usernames are ASCII letters, digits, `_` and `-`.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if !USERNAME_CHARS.contains(&username.len()) {
        return Err(invalid(format!(
            "Username must be between {} and {} characters long",
            USERNAME_CHARS.start(),
            USERNAME_CHARS.end()
        )));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-');
    if username.chars().all(allowed) {
        Ok(())
    } else {
        Err(invalid(
            "Username can only contain letters, numbers, underscores and hyphens",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_rules() {
        for ok in ["learner@example.com", "first.last@uni.ac.uk", "me+cards@example.org"] {
            assert!(validate_email(ok).is_ok(), "{ok} should pass");
        }
        for bad in ["", "learner", "@example.com", "learner@", "a@@example.com"] {
            assert!(validate_email(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("flashcard9").is_ok());
        assert!(validate_password("abc12").is_err());
        assert!(validate_password("onlyletters").is_err());
        assert!(validate_password("1234567890").is_err());
        assert!(validate_password(&format!("a1{}", "z".repeat(127))).is_err());
    }

    #[test]
    fn test_username_rules() {
        for ok in ["anki_fan", "deck-master", "abc", &"x".repeat(30)] {
            assert!(validate_username(ok).is_ok(), "{ok} should pass");
        }
        for bad in ["", "ab", "two words", "<b>bold</b>", "naïve", &"x".repeat(31)] {
            assert!(validate_username(bad).is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Learner@Example.COM "), "learner@example.com");
    }
}
