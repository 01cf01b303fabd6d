use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LanguageModel, LlmError};

/// Client for any OpenAI-compatible `chat/completions` endpoint
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("recall/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Language model request rejected");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("Empty completion".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = OpenAiClient::new(
            "https://api.example.com/v1/",
            "key".to_string(),
            "model".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "gpt",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            temperature: 0.5,
            max_tokens: 100,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"{\"ok\":true}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some(r#"{"ok":true}"#)
        );
    }
}
