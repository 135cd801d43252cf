// Gemini implementation of TextGenerator.
//
// Calls `models/{model}:generateContent` on the Generative Language API and
// returns the concatenated text parts of the first candidate. HTTP statuses
// are mapped onto the LlmError variants the batch driver retries on.
//
// API docs: https://ai.google.dev/api/generate-content

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{LlmError, TextGenerator};

/// Default API root for the Generative Language API.
pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model; the free tier allows 15 requests per minute.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Client for one Gemini model.
pub struct GeminiClient {
    client: Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_url: &str, model: &str, api_key: String) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.api_url, self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, body));
        }

        let body = response.text().await.map_err(transport_error)?;
        let text = response_text(&body)?;

        debug!(chars = text.len(), model = %self.model, "Model responded");
        Ok(text)
    }
}

/// Generated text from a successful response body. A body that is not the
/// expected JSON is an unusable response, the same as garbled model output.
fn response_text(body: &str) -> Result<String, LlmError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::Malformed(format!("undecodable response body: {e}")))?;
    let text = parsed.text();
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(e.to_string())
    } else {
        LlmError::Http(e)
    }
}

/// Map a non-success HTTP status to the error the batch driver expects.
fn error_for_status(status: StatusCode, body: String) -> LlmError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited(body),
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => LlmError::Timeout(body),
        _ => LlmError::Api {
            status: status.as_u16(),
            message: serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body),
        },
    }
}

// --- Generative Language API request/response types ---

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated.
    fn text(&self) -> String {
        self.candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::traits::RetryClass;

    #[test]
    fn test_response_text_joins_parts() {
        let body: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "[{\"a\":"}, {"text": "1}]"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.text(), "[{\"a\":1}]");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let body: GenerateResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert_eq!(body.text(), "");
    }

    #[test]
    fn test_undecodable_success_body_is_retryable_fault() {
        let err = response_text("<html>upstream hiccup</html>").unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
        assert_eq!(err.retry_class(), RetryClass::Fault);
    }

    #[test]
    fn test_blank_success_body_text_is_empty_response() {
        let err = response_text(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
        assert_eq!(
            response_text(r#"{"candidates": [{"content": {"parts": [{"text": "[]"}]}}]}"#)
                .unwrap(),
            "[]"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, "quota".into()).retry_class(),
            RetryClass::RateLimit
        );
        assert_eq!(
            error_for_status(StatusCode::GATEWAY_TIMEOUT, String::new()).retry_class(),
            RetryClass::Timeout
        );
        assert_eq!(
            error_for_status(StatusCode::FORBIDDEN, "denied".into()).retry_class(),
            RetryClass::Fatal
        );
    }

    #[test]
    fn test_api_error_message_extracted() {
        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"code": 400, "message": "API key not valid"}}"#.into(),
        );
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
