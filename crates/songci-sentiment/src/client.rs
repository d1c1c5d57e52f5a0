//! Chat-completions client for the classification endpoint

use std::time::Duration;

use serde::{Deserialize, Serialize};
use songci_core::{HttpError, SHARED_RUNTIME};

use crate::config::ApiConfig;

/// Failure of a single classification attempt.
///
/// Every variant is transient from the classifier's point of view and is
/// retried until the attempt budget runs out.
#[derive(Debug)]
pub enum ClassifyError {
    /// Network error or non-success status
    Http(HttpError),
    /// Reply body is not the expected JSON shape
    Malformed(String),
    /// Reply JSON lacks a required field
    MissingField(&'static str),
    /// Field present but unusable
    InvalidField { field: &'static str, reason: String },
}

impl std::fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(e) => write!(f, "{e}"),
            Self::Malformed(msg) => write!(f, "malformed reply: {msg}"),
            Self::MissingField(field) => write!(f, "reply missing field '{field}'"),
            Self::InvalidField { field, reason } => write!(f, "invalid '{field}': {reason}"),
        }
    }
}

impl std::error::Error for ClassifyError {}

impl From<HttpError> for ClassifyError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

/// One request/response exchange with a chat model.
///
/// Returns the assistant message content. Implementations must be callable
/// from many worker threads at once.
pub trait ChatBackend: Send + Sync {
    fn chat(&self, prompt: &str) -> Result<String, ClassifyError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    temperature: f64,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
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
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `POST {base_url}/chat/completions` client.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    config: ApiConfig,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

/// Connect timeout, separate from the whole-request timeout in [`ApiConfig`]
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl ChatClient {
    pub fn new(config: ApiConfig) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| HttpError::from_reqwest(&e))?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            config,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

impl ChatBackend for ChatClient {
    fn chat(&self, prompt: &str) -> Result<String, ClassifyError> {
        let body = self.request_body(prompt);
        let text = SHARED_RUNTIME.handle().block_on(async {
            let response = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| HttpError::from_reqwest(&e))?;
            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| HttpError::from_reqwest(&e))?;
            if !status.is_success() {
                return Err(HttpError::from_status(status.as_u16(), &text));
            }
            Ok(text)
        })
        .inspect_err(|e| {
            if e.is_server_side() {
                log::debug!("endpoint busy: {e}");
            }
        })?;

        extract_content(&text)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response body.
fn extract_content(body: &str) -> Result<String, ClassifyError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Malformed(format!("unexpected response envelope: {e}")))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ClassifyError::Malformed("response has no message content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ApiConfig {
        ApiConfig {
            api_key: "sk-test".to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn extract_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"a\":1}"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn extract_rejects_empty_choices() {
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(ClassifyError::Malformed(_))
        ));
        assert!(matches!(
            extract_content("<html>bad gateway</html>"),
            Err(ClassifyError::Malformed(_))
        ));
    }

    #[test]
    fn request_body_shape() {
        let client = ChatClient::new(test_config()).unwrap();
        let value = serde_json::to_value(client.request_body("prompt text")).unwrap();
        assert_eq!(value["model"], "deepseek-chat");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "prompt text");
        assert_eq!(value["max_tokens"], 500);
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = ChatClient::new(ApiConfig {
            base_url: "https://example.com/v1/".to_string(),
            ..test_config()
        })
        .unwrap();
        assert_eq!(client.endpoint, "https://example.com/v1/chat/completions");
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            ClassifyError::MissingField("keywords").to_string(),
            "reply missing field 'keywords'"
        );
        let http: ClassifyError = HttpError::from_status(503, "busy").into();
        assert_eq!(http.to_string(), "HTTP 503: busy");
    }
}
