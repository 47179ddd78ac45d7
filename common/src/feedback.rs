//! Retry with live progress feedback in an already-sent chat message.
//!
//! The caller sends the acknowledgement message first and renders the final
//! outcome afterwards; this module only owns the in-flight status text.

use core::fmt::Display;
use core::future::Future;
use core::time::Duration;

use metrics::counter;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::retry::{AttemptResult, RetryObserver, RetryPolicy, execute};

pub const LOADING_INDICATOR: &str = "⏳";

/// A message whose visible content can be replaced.
pub trait ProgressMessage {
    fn update(&self, content: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[must_use]
pub fn attempt_status(attempt: u32, max_attempts: u32, operation_name: &str) -> String {
    format!("{LOADING_INDICATOR} Tentativa {attempt}/{max_attempts} - Processando {operation_name}...")
}

#[must_use]
pub fn backoff_status(attempt: u32, max_attempts: u32, delay: Duration) -> String {
    let seconds = delay.as_secs_f64().round();
    format!(
        "{LOADING_INDICATOR} Instabilidade detectada. Tentando novamente em {seconds:.0}s... ({attempt}/{max_attempts})"
    )
}

/// Observer that mirrors retry progress into a [`ProgressMessage`].
///
/// A failed update is logged and swallowed: losing a cosmetic status line
/// must not abort the operation being retried.
pub struct ProgressFeedback<'a, M> {
    message: &'a M,
    operation_name: &'a str,
}

impl<'a, M: ProgressMessage + Sync> ProgressFeedback<'a, M> {
    pub fn new(message: &'a M, operation_name: &'a str) -> Self {
        Self {
            message,
            operation_name,
        }
    }

    async fn publish(&self, content: String, attempt: u32) {
        match self.message.update(&content).await {
            Ok(()) => debug!(attempt, content = %content, "Progress message updated"),
            Err(e) => {
                counter!("retry.progress_update.failure").increment(1);
                warn!(
                    attempt,
                    error = %e,
                    "Failed to update progress message, continuing retry sequence"
                );
            }
        }
    }
}

impl<M: ProgressMessage + Sync> RetryObserver for ProgressFeedback<'_, M> {
    async fn before_attempt(&self, attempt: u32, max_attempts: u32) {
        self.publish(
            attempt_status(attempt, max_attempts, self.operation_name),
            attempt,
        )
        .await;
    }

    async fn before_backoff(&self, attempt: u32, max_attempts: u32, delay: Duration) {
        self.publish(backoff_status(attempt, max_attempts, delay), attempt)
            .await;
    }
}

/// Runs `operation` under `policy`, surfacing attempt and backoff status in
/// `message`.
///
/// Every log line of the sequence carries `operation` and `initiator` through
/// the enclosing span. There is no overall deadline; callers that need one
/// wrap the returned future in `tokio::time::timeout`.
pub async fn retry_with_feedback<M, T, E, F, Fut>(
    policy: &RetryPolicy,
    message: &M,
    operation_name: &str,
    initiator: &str,
    operation: F,
) -> AttemptResult<T>
where
    M: ProgressMessage + Sync,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<AttemptResult<T>, E>>,
    E: Display,
{
    let span = info_span!("retry_with_feedback", operation = operation_name, initiator);
    let feedback = ProgressFeedback::new(message, operation_name);
    async {
        info!(
            max_attempts = policy.max_attempts,
            initial_delay = ?policy.initial_delay,
            "Starting retry sequence with progress feedback"
        );
        execute(policy, &feedback, operation).await
    }
    .instrument(span)
    .await
}
