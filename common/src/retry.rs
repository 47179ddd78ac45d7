//! Retry utilities for resilient operations.
//!
//! Two flavours live here:
//!
//! * [`retry_with_backoff`] wraps plain `Result` operations with tryhard's
//!   exponential backoff. Used for startup infrastructure calls and for
//!   edits that must land.
//! * [`execute`] runs operations that report an [`AttemptResult`] under an
//!   explicit [`RetryPolicy`], classifying every failure as retriable or
//!   terminal and notifying a [`RetryObserver`] around each backoff.

use core::fmt::Display;
use core::future::Future;
use core::time::Duration;

use metrics::counter;
use tracing::{error, info, warn};

/// Error substrings that mark a failure as transient.
pub const DEFAULT_RETRIABLE_MARKERS: &[&str] = &["500", "Internal Server Error"];

/// Network-level markers that are declared alongside the defaults but are not
/// part of the default classification. A connection reset therefore ends the
/// sequence after one attempt unless a policy opts in explicitly.
pub const DECLARED_NETWORK_MARKERS: &[&str] = &["ECONNRESET", "ETIMEDOUT"];

/// Failure returned when the loop ends without having recorded any failure.
pub const ALL_ATTEMPTS_FAILED: &str = "all retry attempts failed";

/// Outcome of a single attempt, and of a whole retry sequence.
///
/// The payload of [`AttemptResult::Success`] is never inspected by the retry
/// machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult<T> {
    Success(T),
    Failure(String),
}

impl<T> AttemptResult<T> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure(error.into())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(error) => Err(error),
        }
    }
}

/// Attempt ceiling, backoff schedule and failure classification.
///
/// Built once at startup and handed to every retry invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub retriable_markers: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 1.5,
            retriable_markers: DEFAULT_RETRIABLE_MARKERS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Delay to wait after the given (1-indexed) attempt failed retriably.
    ///
    /// `initial_delay * backoff_multiplier^(attempt - 1)`, uncapped.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    #[must_use]
    pub fn is_retriable(&self, error: &str) -> bool {
        self.retriable_markers
            .iter()
            .any(|marker| error.contains(marker.as_str()))
    }
}

/// Side effects injected into the retry loop.
pub trait RetryObserver {
    /// Called right before attempt `attempt`, never before the first one.
    fn before_attempt(&self, attempt: u32, max_attempts: u32) -> impl Future<Output = ()> + Send;

    /// Called after attempt `attempt` failed retriably, before sleeping `delay`.
    fn before_backoff(
        &self,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    ) -> impl Future<Output = ()> + Send;
}

/// Observer for callers without any user-facing surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    async fn before_attempt(&self, _attempt: u32, _max_attempts: u32) {}

    async fn before_backoff(&self, _attempt: u32, _max_attempts: u32, _delay: Duration) {}
}

/// Runs `operation` under `policy` without any progress reporting.
pub async fn retry_with_policy<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> AttemptResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<AttemptResult<T>, E>>,
    E: Display,
{
    execute(policy, &NoopObserver, operation).await
}

/// Invokes `operation` until it succeeds, fails terminally, or the attempt
/// ceiling is reached.
///
/// An `Err` from the operation is normalised into
/// [`AttemptResult::Failure`] carrying its message and classified like any
/// other failure. Attempts never overlap: attempt `n + 1` only starts after
/// attempt `n` and its backoff have fully resolved.
pub async fn execute<T, E, F, Fut, O>(
    policy: &RetryPolicy,
    observer: &O,
    mut operation: F,
) -> AttemptResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<AttemptResult<T>, E>>,
    E: Display,
    O: RetryObserver,
{
    let max_attempts = policy.max_attempts;
    let mut last_failure: Option<String> = None;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            observer.before_attempt(attempt, max_attempts).await;
        }
        info!(attempt, max_attempts, "Starting attempt");
        counter!("retry.attempt.started").increment(1);

        let outcome = operation().await;
        let failure = match outcome {
            Ok(AttemptResult::Success(data)) => {
                counter!("retry.attempt.success").increment(1);
                if attempt > 1 {
                    info!(attempt, max_attempts, "Operation succeeded after retrying");
                }
                return AttemptResult::Success(data);
            }
            Ok(AttemptResult::Failure(failure)) => failure,
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Operation raised an error");
                e.to_string()
            }
        };
        counter!("retry.attempt.failure").increment(1);

        if !policy.is_retriable(&failure) {
            warn!(
                attempt,
                max_attempts,
                error = %failure,
                "Non-retriable failure, giving up"
            );
            return AttemptResult::Failure(failure);
        }

        if attempt < max_attempts {
            let delay = policy.delay_after(attempt);
            observer.before_backoff(attempt, max_attempts, delay).await;
            info!(
                attempt,
                max_attempts,
                delay = ?delay,
                error = %failure,
                "Retriable failure, backing off before next attempt"
            );
            tokio::time::sleep(delay).await;
        }
        last_failure = Some(failure);
    }

    counter!("retry.exhausted").increment(1);
    error!(
        max_attempts,
        error = last_failure.as_deref().unwrap_or(ALL_ATTEMPTS_FAILED),
        "All retry attempts failed"
    );
    AttemptResult::Failure(last_failure.unwrap_or_else(|| ALL_ATTEMPTS_FAILED.to_string()))
}

/// Retries a plain fallible step with exponential backoff starting at one second,
/// capped at thirty seconds between retries.
///
/// Logs each retry and the final failure, tagged with `step`.
pub async fn retry_with_backoff<F, Fut, T, E>(step: &str, max_retries: u32, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    tryhard::retry_fn(operation)
        .retries(max_retries)
        .exponential_backoff(Duration::from_secs(1))
        .max_delay(Duration::from_secs(30))
        .on_retry(|attempt, next_delay: Option<Duration>, error: &E| {
            warn!(
                step,
                attempt,
                max_retries,
                next_delay = ?next_delay,
                error = %error,
                "Step failed, retrying after backoff"
            );
            core::future::ready(())
        })
        .await
        .inspect_err(|e| {
            error!(step, max_retries, error = %e, "Step failed after all retries");
        })
}
