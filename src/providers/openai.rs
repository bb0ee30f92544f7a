//! OpenAI-compatible generation backend
//!
//! Sends the system prompt, recent chat context and the inbound message to a
//! Chat Completions endpoint and returns the first choice's text.
//!
//! # Example
//!
//! ```rust,ignore
//! use groupwatch::providers::{GenerationBackend, OpenAiBackend};
//!
//! let backend = OpenAiBackend::new("your-api-key")
//!     .with_base_url("http://localhost:11434/v1")
//!     .with_model("llama3");
//! let reply = backend.generate(&message, &[]).await?;
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::bus::Message;
use crate::config::GenerationConfig;
use crate::error::GenerationError;

use super::{parse_backend_error, GenerationBackend, GenerationResult};

/// The OpenAI API endpoint URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// The default model to use.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage {
    /// "system" or "user"
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

// ============================================================================
// Backend
// ============================================================================

/// Generation backend for OpenAI-compatible Chat Completions APIs.
pub struct OpenAiBackend {
    api_key: String,
    api_base: String,
    model: String,
    system_prompt: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    client: Client,
}

impl OpenAiBackend {
    /// Create a backend against the public OpenAI endpoint.
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, Client::new())
    }

    /// Create a backend that reuses an existing HTTP client.
    pub fn with_client(api_key: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: OPENAI_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_tokens: None,
            temperature: None,
            client,
        }
    }

    /// Build a backend from configuration. Returns `None` without an API key.
    pub fn from_config(config: &GenerationConfig) -> Option<Self> {
        let key = config.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        let mut backend = Self::new(key).with_model(&config.model);
        if let Some(base) = config.api_base.as_deref().filter(|b| !b.is_empty()) {
            backend = backend.with_base_url(base);
        }
        if !config.system_prompt.trim().is_empty() {
            backend.system_prompt = Some(config.system_prompt.clone());
        }
        backend.max_tokens = Some(config.max_tokens);
        backend.temperature = Some(config.temperature);
        Some(backend)
    }

    /// Point the backend at a different base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api_base = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, message: &Message, history: &[Arc<Message>]) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }

        // History arrives newest first; the model wants it oldest first.
        messages.extend(
            history
                .iter()
                .rev()
                .filter(|m| m.id != message.id && m.has_text())
                .map(|m| ChatMessage::user(context_line(m))),
        );
        messages.push(ChatMessage::user(context_line(message)));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

fn context_line(message: &Message) -> String {
    format!("{}: {}", message.from_display_name, message.text)
}

fn extract_reply(response: ChatResponse) -> GenerationResult<String> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        Err(GenerationError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn classify_failure(status: u16, body: &str) -> GenerationError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => {
            let detail = match parsed.error.r#type {
                Some(kind) => format!("{} - {}", kind, parsed.error.message),
                None => parsed.error.message,
            };
            parse_backend_error(status, &detail)
        }
        Err(_) => parse_backend_error(status, body),
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(
        &self,
        message: &Message,
        history: &[Arc<Message>],
    ) -> GenerationResult<String> {
        let request = self.build_request(message, history);
        debug!(
            model = %self.model,
            turns = request.messages.len(),
            "Generation request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(e.to_string())
                } else {
                    GenerationError::Unknown(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Unknown(format!("failed to parse response: {}", e)))?;

        info!(model = %self.model, "Generation response received");
        extract_reply(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, name: &str, text: &str) -> Arc<Message> {
        let mut m = Message::new(id, "g1", text);
        m.from_display_name = name.to_string();
        Arc::new(m)
    }

    #[test]
    fn test_backend_creation() {
        let backend = OpenAiBackend::new("key");
        assert_eq!(backend.name(), "openai");
        assert_eq!(backend.api_base(), "https://api.openai.com/v1");
        assert_eq!(backend.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let backend = OpenAiBackend::new("key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(backend.api_base(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = GenerationConfig::default();
        assert!(OpenAiBackend::from_config(&config).is_none());
        config.api_key = Some("  ".into());
        assert!(OpenAiBackend::from_config(&config).is_none());

        config.api_key = Some("sk-test".into());
        config.api_base = Some("http://proxy/v1".into());
        config.model = "custom".into();
        let backend = OpenAiBackend::from_config(&config).unwrap();
        assert_eq!(backend.api_base(), "http://proxy/v1");
        assert_eq!(backend.model(), "custom");
    }

    #[test]
    fn test_request_orders_context_oldest_first() {
        let mut config = GenerationConfig::default();
        config.api_key = Some("k".into());
        let backend = OpenAiBackend::from_config(&config).unwrap();

        let current = msg("3", "Ann", "what now?");
        // Newest first, current message included
        let history = vec![
            Arc::clone(&current),
            msg("2", "Bob", "second"),
            msg("1", "Ann", "first"),
        ];
        let request = backend.build_request(&current, &history);

        assert_eq!(request.messages[0].role, "system");
        let turns: Vec<&str> = request
            .messages
            .iter()
            .skip(1)
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(turns, vec!["Ann: first", "Bob: second", "Ann: what now?"]);
        assert_eq!(request.max_tokens, Some(200));
    }

    #[test]
    fn test_request_serialization_omits_unset_options() {
        let backend = OpenAiBackend::new("k");
        let request = backend.build_request(&msg("1", "Ann", "hi"), &[]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_extract_reply() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Hello!  "}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_reply(response).unwrap(), "Hello!");
    }

    #[test]
    fn test_extract_reply_empty() {
        let none: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            extract_reply(none),
            Err(GenerationError::EmptyResponse)
        ));

        let blank: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(matches!(
            extract_reply(blank),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn test_classify_failure_parses_error_body() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        match classify_failure(401, body) {
            GenerationError::Auth(detail) => {
                assert_eq!(detail, "invalid_request_error - Invalid API key")
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            classify_failure(503, "upstream down"),
            GenerationError::ServerError(_)
        ));
    }
}
