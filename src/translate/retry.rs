// Fixed-backoff retry around a translator.
//
// Translation failures are usually transient (throttling, dropped
// connections). The first failure is followed by one fixed pause and exactly
// one more attempt; a second failure is reported with the attempt count so
// the caller can record it on the affected record.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use super::traits::Translator;
use crate::pacing::Sleeper;

/// Default pause between the first and second translation attempt.
pub const DEFAULT_TRANSLATE_BACKOFF: Duration = Duration::from_secs(1);

/// Translation still failed after every allowed attempt.
#[derive(Debug, Error)]
#[error("translation failed after {attempts} attempt(s): {cause}")]
pub struct TranslationFailure {
    pub attempts: u32,
    pub cause: anyhow::Error,
}

/// Translate `text`, retrying exactly once after `backoff` on failure.
pub async fn translate_with_retry(
    translator: &dyn Translator,
    sleeper: &dyn Sleeper,
    text: &str,
    backoff: Duration,
) -> Result<String, TranslationFailure> {
    match translator.translate(text).await {
        Ok(translated) => Ok(translated),
        Err(first) => {
            warn!(
                error = %first,
                backoff_ms = backoff.as_millis() as u64,
                "Translation failed, retrying once"
            );
            sleeper.sleep(backoff).await;
            translator
                .translate(text)
                .await
                .map_err(|cause| TranslationFailure { attempts: 2, cause })
        }
    }
}

/// Translate `text` with a single attempt and no backoff (used by the
/// post-pass retry sweep).
pub async fn translate_once(
    translator: &dyn Translator,
    text: &str,
) -> Result<String, TranslationFailure> {
    translator
        .translate(text)
        .await
        .map_err(|cause| TranslationFailure { attempts: 1, cause })
}
