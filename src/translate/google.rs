// Google translate implementation.
//
// Uses the keyless `translate_a/single` endpoint that browser extensions use.
// The response is a nested JSON array; the first element holds one entry per
// translated sentence, each starting with the translated text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::traits::Translator;

/// Default endpoint for the public translation service.
pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// Translator backed by the public Google translate endpoint.
pub struct GoogleTranslator {
    client: Client,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for translation")?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", "en"),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .context("Failed to call translation service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Translation service returned {}: {}", status, body);
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse translation response")?;

        let translated = parse_translation(&body)?;
        debug!(original = text, translated = %translated, "Translated title");
        Ok(translated)
    }
}

/// Concatenate the translated segments of a `translate_a/single` response.
pub fn parse_translation(body: &Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .context("Translation response has no sentence list")?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        anyhow::bail!("Translation response contained no text");
    }
    Ok(translated.trim().to_string())
}
