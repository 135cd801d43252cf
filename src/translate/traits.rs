// Translator trait: the seam between the pipeline and the translation service.

use anyhow::Result;
use async_trait::async_trait;

/// Translates a single title into English, auto-detecting the source language.
///
/// Failures are opaque; callers decide whether and how to retry.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}
