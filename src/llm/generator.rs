//! Core `ResponseGenerator` trait and the Gemini `generateContent` client.
//!
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;

use super::conversation::{HistoryMessage, Role};

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur during response generation.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The API key is missing, malformed or rejected.
    #[error("API key rejected or missing")]
    InvalidCredential,

    /// The account's request quota is exhausted.
    #[error("API quota exceeded")]
    QuotaExceeded,

    /// The request did not complete within the configured timeout.
    #[error("generation request timed out")]
    Timeout,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse generation response: {0}")]
    Parse(String),

    /// The model returned a response with no usable text.
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e.to_string())
        }
    }
}

/// Map an API error response onto the error taxonomy.
fn classify_api_error(status: u16, message: &str) -> LlmError {
    let lower = message.to_ascii_lowercase();
    if status == 429 || lower.contains("quota") || lower.contains("resource_exhausted") {
        return LlmError::QuotaExceeded;
    }
    if status == 401 || status == 403 || lower.contains("api key") {
        return LlmError::InvalidCredential;
    }
    LlmError::Request(format!("{status}: {message}"))
}

// ---------------------------------------------------------------------------
// ResponseGenerator trait
// ---------------------------------------------------------------------------

/// Async trait for answer generation.
///
/// Implementors must be `Send + Sync` so they can be shared across threads
/// (e.g. wrapped in `Arc<dyn ResponseGenerator>`).
///
/// # Arguments
/// * `prompt`   – Fully assembled prompt for the current question.
/// * `history`  – Prior completed turns, oldest first.
/// * `roleplay` – Whether the role-play sampling temperature applies.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        history: &[HistoryMessage],
        roleplay: bool,
    ) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Calls the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl GeminiClient {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails.
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn request_body(
        &self,
        prompt: &str,
        history: &[HistoryMessage],
        roleplay: bool,
    ) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = history
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.api_name(),
                    "parts": [{ "text": m.text }]
                })
            })
            .collect();
        contents.push(serde_json::json!({
            "role": Role::User.api_name(),
            "parts": [{ "text": prompt }]
        }));

        let temperature = if roleplay {
            self.config.roleplay_temperature
        } else {
            self.config.temperature
        };

        serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": self.config.max_output_tokens
            }
        })
    }
}

#[async_trait]
impl ResponseGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        history: &[HistoryMessage],
        roleplay: bool,
    ) -> Result<String, LlmError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::InvalidCredential)?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, key
        );

        let body = self.request_body(prompt, history, roleplay);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status().as_u16();
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if !(200..300).contains(&status) {
            let message = json["error"]["message"].as_str().unwrap_or("");
            return Err(classify_api_error(status, message));
        }

        let text = json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or(LlmError::EmptyResponse)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
