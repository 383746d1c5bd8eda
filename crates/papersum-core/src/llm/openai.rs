//! Client for OpenAI-compatible `/chat/completions` endpoints.

use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::{Value, json};

use super::{CompletionClient, CompletionError, Message};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Connection settings for [`OpenAiClient`].
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, without the trailing `/chat/completions`.
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Client-side pacing. `None` sends requests as fast as they are issued.
    pub requests_per_second: Option<u32>,
    /// HTTP-level timeout for a single request. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_tokens: None,
            requests_per_second: None,
            timeout: Some(Duration::from_secs(crate::DEFAULT_CALL_TIMEOUT_SECS)),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("requests_per_second", &self.requests_per_second)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// [`CompletionClient`] backed by an OpenAI-compatible chat completions API.
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
    limiter: Option<DirectLimiter>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        let mut builder = reqwest::Client::builder().pool_idle_timeout(Duration::from_secs(30));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| CompletionError::Http(format!("failed to build HTTP client: {e}")))?;

        let limiter = config
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|n| DirectLimiter::direct(Quota::per_second(n)));

        Ok(Self {
            config,
            http,
            limiter,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, messages: &[Message]) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });
        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

impl CompletionClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn complete<'a>(
        &'a self,
        messages: Vec<Message>,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        Box::pin(async move {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let body = self.request_body(&messages);
            tracing::debug!(
                model = %self.config.model,
                messages = messages.len(),
                "sending completion request"
            );

            let resp = self
                .http
                .post(self.endpoint())
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        CompletionError::Timeout(self.config.timeout.unwrap_or_default())
                    } else {
                        CompletionError::Http(e.to_string())
                    }
                })?;

            let status = resp.status();
            if status.as_u16() == 429 {
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<f64>().ok())
                    .filter(|secs| secs.is_finite() && *secs >= 0.0)
                    .map(Duration::from_secs_f64);
                return Err(CompletionError::RateLimited { retry_after });
            }
            if !status.is_success() {
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("failed to read error body: {e}"));
                return Err(CompletionError::Api {
                    status: status.as_u16(),
                    body,
                });
            }

            let data: Value = resp
                .json()
                .await
                .map_err(|e| CompletionError::Parse(e.to_string()))?;
            extract_reply(&data)
        })
    }
}

/// Pull `choices[0].message.content` out of a chat completions response.
pub(crate) fn extract_reply(data: &Value) -> Result<String, CompletionError> {
    let content = data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| CompletionError::Parse("missing choices[0].message.content".into()))?;
    if content.trim().is_empty() {
        return Err(CompletionError::EmptyResponse);
    }
    Ok(content.to_string())
}
