// Request pacing for the rate-limited collaborators.
//
// The generative model's free tier allows a fixed number of requests per
// minute and per day. RateBudget tracks both for one run: a minimum interval
// slept before every batch call, and a daily cap after which no new batch is
// issued. Nothing is persisted across runs.
//
// Every wait goes through the Sleeper trait so tests can observe the
// requested durations without actually sleeping.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Something that can pause the current task.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Sleeper that returns immediately and remembers every requested duration.
#[derive(Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.calls().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(duration);
        }
    }
}

/// Interval between requests that keeps a caller under `requests_per_minute`.
pub fn interval_for_rpm(requests_per_minute: u32) -> Duration {
    if requests_per_minute == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(60.0 / requests_per_minute as f64)
}

/// Per-run request budget for the generative model.
#[derive(Debug, Clone)]
pub struct RateBudget {
    /// Daily cap on batch requests.
    max_requests: u32,
    /// Fixed pause before every batch request.
    interval: Duration,
    requests_made: u32,
}

impl RateBudget {
    pub fn new(max_requests_per_day: u32, max_requests_per_minute: u32) -> Self {
        Self {
            max_requests: max_requests_per_day,
            interval: interval_for_rpm(max_requests_per_minute),
            requests_made: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn requests_made(&self) -> u32 {
        self.requests_made
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// True once the daily cap has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.requests_made >= self.max_requests
    }

    /// Count one batch request against the daily cap.
    pub fn record_request(&mut self) {
        self.requests_made += 1;
    }

    /// Sleep the fixed inter-request interval.
    pub async fn throttle(&self, sleeper: &dyn Sleeper) {
        debug!(
            interval_ms = self.interval.as_millis() as u64,
            "Throttling before request"
        );
        sleeper.sleep(self.interval).await;
    }
}
