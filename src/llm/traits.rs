// TextGenerator trait and the typed errors the batch driver retries on.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a generative model call or by the checks applied to
/// its response.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited (429): {0}")]
    RateLimited(String),

    #[error("deadline exceeded (504): {0}")]
    Timeout(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("model returned {got} verdicts for {expected} titles")]
    CountMismatch { expected: usize, got: usize },

    #[error("verdict {position} echoes {got:?}, expected {expected:?}")]
    EchoMismatch {
        position: usize,
        expected: String,
        got: String,
    },

    #[error("verdict {position} has unknown value {value:?}")]
    UnknownVerdict { position: usize, value: String },
}

/// How the batch driver reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Back off for the long cooldown, then retry.
    RateLimit,
    /// Back off for the short cooldown, then retry.
    Timeout,
    /// Response unusable (unparseable, wrong length, wrong echo); retry.
    Fault,
    /// Give up on this batch immediately.
    Fatal,
}

impl LlmError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            LlmError::RateLimited(_) => RetryClass::RateLimit,
            LlmError::Timeout(_) => RetryClass::Timeout,
            LlmError::EmptyResponse
            | LlmError::Malformed(_)
            | LlmError::CountMismatch { .. }
            | LlmError::EchoMismatch { .. }
            | LlmError::UnknownVerdict { .. } => RetryClass::Fault,
            LlmError::Api { status, message } => {
                classify_error_text(&format!("{status} {message}")).unwrap_or(RetryClass::Fatal)
            }
            LlmError::Http(e) if e.is_timeout() => RetryClass::Timeout,
            LlmError::Http(e) => classify_error_text(&e.to_string()).unwrap_or(RetryClass::Fatal),
        }
    }
}

/// Recognise rate-limit and timeout signals in an opaque error string.
pub fn classify_error_text(text: &str) -> Option<RetryClass> {
    let lower = text.to_lowercase();
    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("resource_exhausted")
        || lower.contains("resource exhausted")
    {
        Some(RetryClass::RateLimit)
    } else if lower.contains("504") || lower.contains("deadline exceeded") {
        Some(RetryClass::Timeout)
    } else {
        None
    }
}

/// A generative text model: one prompt in, one free-text response out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
