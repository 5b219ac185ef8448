//! Chat-completion transport for the AI fallback
//!
//! Any OpenAI-compatible `/chat/completions` endpoint works; the default
//! configuration targets Perplexity's `sonar` model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Error type for LLM requests
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key required for the completion service")]
    MissingApiKey,

    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    Parse(String),

    #[error("Completion response contained no choices")]
    EmptyResponse,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Abstract interface for completion services
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send the conversation and return the assistant's reply text
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError>;

    /// Model identifier, for diagnostics
    fn model(&self) -> &str;
}

/// Configuration for the OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout_seconds: Option<u64>,
}

/// OpenAI-compatible provider (Perplexity, OpenAI, OpenRouter, ...)
pub struct OpenAiCompatibleProvider {
    config: LlmProviderConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: LlmProviderConfig) -> Result<Self, LlmError> {
        if config.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(LlmError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.unwrap_or(30)))
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let api_key = self.config.api_key.as_ref().ok_or(LlmError::MissingApiKey)?;

        let request_body = ChatRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(format!("failed to read response body: {}", e)))?;
        debug!(
            "Completion from {} took {}ms (status {})",
            self.config.model,
            start.elapsed().as_millis(),
            status.as_u16()
        );

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: truncate(&raw_body, 300),
            });
        }

        parse_completion(&raw_body)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Extract the first choice's message content from a response body
pub fn parse_completion(raw_body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(raw_body).map_err(|e| LlmError::Parse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.trim().to_string())
        .ok_or(LlmError::EmptyResponse)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

// OpenAI API types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>) -> LlmProviderConfig {
        LlmProviderConfig {
            base_url: "https://api.perplexity.ai/".to_string(),
            model: "sonar".to_string(),
            api_key: api_key.map(str::to_string),
            max_tokens: None,
            temperature: None,
            timeout_seconds: None,
        }
    }

    #[test]
    fn test_provider_requires_api_key() {
        assert!(matches!(
            OpenAiCompatibleProvider::new(config(None)),
            Err(LlmError::MissingApiKey)
        ));
        assert!(matches!(
            OpenAiCompatibleProvider::new(config(Some(""))),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let provider = OpenAiCompatibleProvider::new(config(Some("k"))).unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://api.perplexity.ai/chat/completions"
        );
        assert_eq!(provider.model(), "sonar");
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  pip install beautifulsoup4\n"},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "pip install beautifulsoup4");
    }

    #[test]
    fn test_parse_completion_errors() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(LlmError::EmptyResponse)
        ));
        assert!(matches!(parse_completion("not json"), Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_request_omits_unset_options() {
        let req = ChatRequest {
            model: "sonar".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: None,
            temperature: Some(0.0),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
