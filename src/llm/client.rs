//! Core `AssistantClient` trait and the Gemini REST implementation.
//!
//! [`GeminiClient`] calls `POST {base_url}/v1beta/models/{model}:generateContent`
//! with the API key as the `key` query parameter.  All connection details come
//! from [`LlmConfig`]; the key itself comes from the environment.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::LlmConfig;

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the conversational model.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No credential was supplied, so no client could be built.
    #[error("no API key configured")]
    NotConfigured,

    /// HTTP transport or connection error, or a non-success status.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The model answered with no usable text.
    #[error("empty response")]
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

// ---------------------------------------------------------------------------
// AssistantClient trait
// ---------------------------------------------------------------------------

/// One-shot prompt → completion service.
///
/// Implementors must be `Send + Sync` so they can be shared behind
/// `Arc<dyn AssistantClient>`.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
}

impl GeminiClient {
    /// Build a client, reading the key from the environment variable named in
    /// `config.api_key_env`.
    ///
    /// Returns [`LlmError::NotConfigured`] when the variable is unset or
    /// blank; callers treat that as degraded mode, not a startup failure.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key().ok_or(LlmError::NotConfigured)?;
        Ok(Self::with_key(config, api_key))
    }

    /// Build a client with an explicit key.
    pub fn with_key(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl AssistantClient for GeminiClient {
    /// Send `prompt` as a single user turn and return the concatenated text
    /// of the first candidate, trimmed.  An empty string is a valid answer;
    /// the caller decides how to phrase it.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ]
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!(
                "{status}: {}",
                api_error_message(&detail).unwrap_or(detail)
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(candidate_text(&json))
    }
}

/// Join all text parts of the first candidate.  Missing fields yield `""`.
pub(crate) fn candidate_text(json: &serde_json::Value) -> String {
    json["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Pull `error.message` out of a Google API error body, if present.
fn api_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json["error"]["message"].as_str().map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_config_without_key_is_not_configured() {
        let mut config = LlmConfig::default();
        config.api_key_env = "LOKI_TEST_GEMINI_KEY_UNSET".into();
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(LlmError::NotConfigured)
        ));
    }

    #[test]
    fn endpoint_includes_model_and_trims_slash() {
        let mut config = LlmConfig::default();
        config.base_url = "https://example.test/".into();
        let client = GeminiClient::with_key(&config, "k");
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn candidate_text_joins_parts_and_trims() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [ { "text": "  Hello" }, { "text": " there. \n" } ] } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        });
        assert_eq!(candidate_text(&body), "Hello there.");
    }

    #[test]
    fn candidate_text_missing_fields_is_empty() {
        assert_eq!(candidate_text(&json!({})), "");
        assert_eq!(candidate_text(&json!({ "candidates": [] })), "");
        assert_eq!(
            candidate_text(&json!({ "candidates": [ { "finishReason": "SAFETY" } ] })),
            ""
        );
    }

    #[test]
    fn api_error_message_extracts_google_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid."}}"#;
        assert_eq!(api_error_message(body).as_deref(), Some("API key not valid."));
        assert_eq!(api_error_message("not json"), None);
    }

    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn AssistantClient> =
            Box::new(GeminiClient::with_key(&LlmConfig::default(), "k"));
        drop(client);
    }
}
