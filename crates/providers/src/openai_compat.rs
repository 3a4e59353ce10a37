//! OpenAI-compatible completion client.
//!
//! Works with OpenRouter, OpenAI, Ollama and any endpoint exposing
//! `POST {base}/chat/completions`. Requests are non-streaming.
//!
//! Replies are accepted in any of the envelope shapes seen in the wild,
//! probed in this order:
//! 1. `choices[0].message.content` (OpenAI / OpenRouter)
//! 2. `candidates[0].content.parts[0].text` (Gemini)
//! 3. `response` (flat)
//! 4. `text` (flat)
//! 5. `content` (the gateway's own proxy shape)

use std::time::Duration;

use async_trait::async_trait;
use neutro_core::error::ProviderError;
use neutro_core::provider::{CompletionRequest, CompletionResponse};
use serde_json::Value;
use tracing::{debug, warn};

/// Default upper bound on a completion call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    referer: Option<String>,
    title: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            referer: None,
            title: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            client: build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Set the `HTTP-Referer` attribution header.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Set the `X-Title` attribution header.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self.client = build_client(secs);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Pull the reply text out of a completion body.
///
/// Returns `MalformedResponse` when no known shape matches.
pub fn extract_reply(body: &Value) -> Result<String, ProviderError> {
    let probes = [
        body.pointer("/choices/0/message/content"),
        body.pointer("/candidates/0/content/parts/0/text"),
        body.get("response"),
        body.get("text"),
        body.get("content"),
    ];

    probes
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            let mut keys: Vec<&str> = body
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            keys.sort_unstable();
            ProviderError::MalformedResponse(format!(
                "no reply text in response (top-level keys: {keys:?})"
            ))
        })
}

#[async_trait]
impl neutro_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{}'",
                self.name
            )));
        }

        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(
            provider = %self.name,
            model = %request.model,
            turns = request.messages.len(),
            "Sending completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");

        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout_secs)
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Provider returned error");
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body: error_body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            ProviderError::MalformedResponse(format!("response is not JSON: {e}"))
        })?;

        let reply = extract_reply(&value)?;
        let model = value
            .get("model")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(CompletionResponse { text: reply, model })
    }
}
