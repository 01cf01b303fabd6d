//! Language model access used for card generation and quiz writing/grading.
//!
//! Handlers talk to a [`LanguageModel`] trait object so the hosted client can be
//! swapped for a scripted model in tests.

pub mod openai;
pub mod prompts;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use openai::OpenAiClient;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A single prompt sent to the model
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Instructions for the model
    pub system: String,
    /// User message
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Return the raw text of the model's reply.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Run a completion and parse the reply as JSON.
pub async fn complete_json<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    request: CompletionRequest,
) -> Result<T, LlmError> {
    let started = std::time::Instant::now();
    let result = model.complete(request).await;
    crate::metrics::record_llm_request(started.elapsed().as_secs_f64(), result.is_ok());

    let text = result?;
    extract_json(&text)
}

/// Parse a JSON value out of a model reply.
///
/// Models often wrap JSON in a fenced code block or add a sentence around it, so
/// this tries the whole text first, then the first fenced block, then the span
/// between the first opening and last closing brace.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str(fenced)
    {
        return Ok(value);
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| LlmError::InvalidResponse(format!("Malformed JSON: {e}"))),
        _ => Err(LlmError::InvalidResponse(
            "No JSON object found in model reply".to_string(),
        )),
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag such as ```json
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: i32,
    }

    #[test]
    fn test_extract_plain_json() {
        let parsed: Payload = extract_json(r#"{"value": 3}"#).unwrap();
        assert_eq!(parsed, Payload { value: 3 });
    }

    #[test]
    fn test_extract_fenced_json() {
        let reply = "Here you go:\n```json\n{\"value\": 7}\n```\nGood luck!";
        let parsed: Payload = extract_json(reply).unwrap();
        assert_eq!(parsed, Payload { value: 7 });
    }

    #[test]
    fn test_extract_json_surrounded_by_prose() {
        let reply = "Sure! {\"value\": 11} Let me know if you need more.";
        let parsed: Payload = extract_json(reply).unwrap();
        assert_eq!(parsed, Payload { value: 11 });
    }

    #[test]
    fn test_extract_json_errors() {
        assert!(matches!(
            extract_json::<Payload>("no json here"),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(matches!(
            extract_json::<Payload>("{\"value\": \"oops\"}"),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
