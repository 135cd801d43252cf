// Per-batch classification driver.
//
// One batch = one prompt = one verdict per title. Each attempt's response is
// parsed and validated; a failed attempt is retried after a cooldown chosen
// by the error's retry class, up to the attempt ceiling. When the ceiling is
// reached, or the error is not retryable, every title in the batch gets an
// ERROR verdict so the batch never disappears from the output.

use std::time::Duration;

use tracing::{error, info, warn};

use super::extract::{parse_verdicts, validate_batch, TitleVerdict};
use super::prompts::classification_prompt;
use super::traits::{LlmError, RetryClass, TextGenerator};
use crate::pacing::Sleeper;

/// Retry policy for one batch.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Total attempts per batch, including the first.
    pub retry_attempts: u32,
    pub rate_limit_cooldown: Duration,
    pub timeout_cooldown: Duration,
    /// Cooldown after an unusable response (unparseable, wrong count, wrong echo).
    pub fault_cooldown: Duration,
    /// Reject responses whose echoed titles disagree with the request.
    pub echo_check: bool,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            retry_attempts: 2,
            rate_limit_cooldown: Duration::from_secs(15),
            timeout_cooldown: Duration::from_secs(10),
            fault_cooldown: Duration::from_secs(10),
            echo_check: true,
        }
    }
}

impl BatchPolicy {
    fn cooldown_for(&self, class: RetryClass) -> Option<Duration> {
        match class {
            RetryClass::RateLimit => Some(self.rate_limit_cooldown),
            RetryClass::Timeout => Some(self.timeout_cooldown),
            RetryClass::Fault => Some(self.fault_cooldown),
            RetryClass::Fatal => None,
        }
    }
}

/// How a batch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    Classified {
        attempts: u32,
    },
    /// Every title received an ERROR verdict.
    Failed {
        attempts: u32,
        /// The last error was a structural fault in the response rather
        /// than a service error.
        fault: bool,
        error: String,
    },
}

/// Verdicts for one batch, one per requested title, in request order.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub verdicts: Vec<TitleVerdict>,
    pub status: BatchStatus,
}

impl BatchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, BatchStatus::Failed { .. })
    }
}

/// Classify one batch of titles.
pub async fn classify_batch(
    generator: &dyn TextGenerator,
    sleeper: &dyn Sleeper,
    policy: &BatchPolicy,
    titles: &[&str],
) -> BatchOutcome {
    let prompt = classification_prompt(titles);
    let max_attempts = policy.retry_attempts.max(1);
    let mut attempts = 0;
    let mut last_error: Option<LlmError> = None;

    while attempts < max_attempts {
        attempts += 1;

        let result = match generator.generate(&prompt).await {
            Ok(raw) => parse_verdicts(&raw)
                .and_then(|entries| validate_batch(titles, entries, policy.echo_check)),
            Err(e) => Err(e),
        };

        let err = match result {
            Ok(verdicts) => {
                return BatchOutcome {
                    verdicts,
                    status: BatchStatus::Classified { attempts },
                };
            }
            Err(err) => err,
        };

        let class = err.retry_class();
        let Some(cooldown) = policy.cooldown_for(class) else {
            error!(error = %err, attempt = attempts, "Model call failed, not retrying");
            last_error = Some(err);
            break;
        };

        if attempts < max_attempts {
            warn!(
                error = %err,
                attempt = attempts,
                max_attempts,
                cooldown_secs = cooldown.as_secs_f64(),
                "Batch attempt failed ({:?}), retrying in {:.0}s",
                class,
                cooldown.as_secs_f64(),
            );
            sleeper.sleep(cooldown).await;
        } else {
            warn!(error = %err, attempt = attempts, "Batch attempt failed, no attempts left");
        }
        last_error = Some(err);
    }

    let fault = last_error
        .as_ref()
        .is_some_and(|e| e.retry_class() == RetryClass::Fault);
    let error = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts made".to_string());

    info!(titles = titles.len(), attempts, fault, "Batch marked as ERROR");

    BatchOutcome {
        verdicts: titles.iter().map(|_| TitleVerdict::error()).collect(),
        status: BatchStatus::Failed {
            attempts,
            fault,
            error,
        },
    }
}
