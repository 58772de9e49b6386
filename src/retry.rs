//! Retry envelope with exponential backoff.
//!
//! Every client operation runs inside [`RetryPolicy::execute`], which
//! re-attempts transient failures up to a configured budget, honors
//! `Retry-After` on rate-limited responses, and aborts promptly when the
//! caller's cancellation token fires.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::header::RETRY_AFTER;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Status codes retried when no explicit set is configured.
pub(crate) const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Observer invoked with (retry number, last error, upcoming delay) before
/// each inter-attempt wait.
pub type RetryObserver = Arc<dyn Fn(u32, &Error, Duration) + Send + Sync>;

/// Retry configuration.
#[derive(Clone)]
pub struct RetryConfig {
    /// Whether retries are enabled. When false, exactly one attempt is made.
    pub enabled: bool,
    /// Upper bound on total attempts (the first attempt counts).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Cap applied to the exponential delay.
    pub max_backoff: Duration,
    /// Growth factor applied per retry.
    pub backoff_multiplier: f64,
    /// Explicit status codes to retry on. Empty means the default set
    /// (408, 429, 500, 502, 503, 504).
    pub retryable_status_codes: Vec<u16>,
    /// Optional observer invoked before each wait.
    pub on_retry: Option<RetryObserver>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            retryable_status_codes: Vec::new(),
            on_retry: None,
        }
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("enabled", &self.enabled)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("has_on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryConfig {
    /// Create a configuration with retries disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Check if a status code should trigger a retry under this configuration.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        if self.retryable_status_codes.is_empty() {
            DEFAULT_RETRYABLE_STATUS_CODES.contains(&status)
        } else {
            self.retryable_status_codes.contains(&status)
        }
    }

    /// Delay preceding the given retry (1-indexed). Retry 0 is the first
    /// attempt and has no preceding wait.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_backoff.as_secs_f64();
        let delay = base * self.backoff_multiplier.powi(retry as i32 - 1);
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}

/// Retry policy wrapping a [`RetryConfig`].
///
/// Read-only after construction; shared by reference across all calls issued
/// by one client instance.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute a single-attempt operation under this policy.
    ///
    /// The operation performs one HTTP round-trip; transport failures must
    /// already be mapped into [`Error`]. The envelope returns whatever the
    /// last attempt produced: a response (even a still-erroring one after
    /// exhaustion) or the final transport error. Translating a non-success
    /// response into a typed error is the operation layer's job.
    pub(crate) async fn execute<F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response>>,
    {
        if !self.config.enabled {
            return tokio::select! {
                () = cancel.cancelled() => Err(Error::Cancelled),
                outcome = operation() => outcome,
            };
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut retry_after: Option<Duration> = None;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let retry = attempt - 1;
                let delay = retry_after
                    .take()
                    .unwrap_or_else(|| self.config.backoff_delay(retry));

                if let (Some(observer), Some(error)) = (&self.config.on_retry, &last_error) {
                    observer(retry, error, delay);
                }

                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "waiting before retry"
                );

                tokio::select! {
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            let outcome = tokio::select! {
                () = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = operation() => outcome,
            };

            match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !self.config.is_retryable_status(status) || attempt == max_attempts {
                        return Ok(response);
                    }

                    if status == 429 {
                        retry_after = response
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(parse_retry_after);
                    }

                    warn!(status, attempt, max_attempts, "retryable status from gateway");
                    last_error = Some(Error::api(status, format!("HTTP {status}")));
                }
                Err(error) => {
                    if !error.is_retryable() || attempt == max_attempts {
                        return Err(error);
                    }

                    warn!(%error, attempt, max_attempts, "retryable transport error");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::internal("retry loop ended without an outcome")))
    }
}

/// Parse a `Retry-After` header value into a wait duration.
///
/// Accepts an integer or decimal count of seconds, or an HTTP-date
/// (RFC 7231). A date in the past yields `None` so the caller falls back to
/// exponential backoff.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(Duration::from_secs_f64(seconds));
        }
        return None;
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    (date.with_timezone(&Utc) - Utc::now()).to_std().ok()
}
