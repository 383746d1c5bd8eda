//! Completion client trait and implementations for text-generation services.

pub mod mock;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::{OpenAiClient, OpenAiConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message sent to a [`CompletionClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("rate limited (429){}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    #[error("completion timed out after {0:?}")]
    Timeout(Duration),
    #[error("failed to parse completion response: {0}")]
    Parse(String),
    #[error("completion returned no text")]
    EmptyResponse,
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {:.1}s", d.as_secs_f64()))
        .unwrap_or_default()
}

/// A text-generation service that answers one message list with one reply.
///
/// Implementations are stateless per call and perform no retries; retry and
/// backoff policy, if any, belongs to the caller.
pub trait CompletionClient: Send + Sync {
    /// Model identifier, used for logging.
    fn model(&self) -> &str;

    /// Generate one reply for `messages`.
    fn complete<'a>(
        &'a self,
        messages: Vec<Message>,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(Message::system("be brief")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be brief");
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), "assistant");
    }

    #[test]
    fn rate_limited_display() {
        let err = CompletionError::RateLimited {
            retry_after: Some(Duration::from_millis(1500)),
        };
        assert_eq!(err.to_string(), "rate limited (429), retry after 1.5s");
        let err = CompletionError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "rate limited (429)");
    }
}
