//! Language-model adapter boundary.
//!
//! The pipeline treats the model as an opaque function from messages to text
//! (optionally constrained to a JSON object). Retry behavior lives entirely
//! inside the client, opaque to the planner and synthesizer.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use crate::error::ProviderError;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
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

/// LLM collaborator interface. `json_response` requests a completion that is
/// a single JSON object, suitable for schema coercion by the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        json_response: bool,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GroqSettings {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_attempts: u32,
}

impl GroqSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.4,
            max_tokens: 1000,
            max_attempts: 3,
        }
    }
}

/// OpenAI-compatible chat-completions client for Groq.
pub struct GroqClient {
    client: reqwest::Client,
    settings: GroqSettings,
}

impl GroqClient {
    pub fn new(settings: GroqSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        Ok(Self { client, settings })
    }

    async fn attempt(&self, body: &serde_json::Value) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(&self.settings.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(ProviderError::MalformedResponse)
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        json_response: bool,
    ) -> Result<String, ProviderError> {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });
        if json_response {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&body).await {
                Ok(content) => return Ok(content),
                Err(err) if attempt < max_attempts && err.is_retryable() => {
                    warn!(attempt, error = %err, "provider call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
