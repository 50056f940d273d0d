//! Retry controller: drives the attempt loop around an executor.
//!
//! # Responsibilities
//! - Per-attempt deadline via a child cancellation token
//! - Capture of action failures as transient `ExecutorException` results
//! - Classification of deadline cancellation as transient `Timeout`
//! - Exponential backoff (outer-cancellation aware) between attempts
//! - Accumulation of the ordered attempt history

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::schema::RetryConfig;
use crate::executor::result::{codes, ExecutionResult};
use crate::executor::ExecutorError;
use crate::resilience::backoff::calculate_backoff;

/// Ordered, non-empty attempt history; the final element is the terminal
/// outcome.
#[derive(Debug)]
pub struct RetryResult {
    pub attempts: Vec<ExecutionResult>,
}

impl RetryResult {
    /// The terminal outcome.
    pub fn last(&self) -> &ExecutionResult {
        self.attempts.last().expect("retry history is never empty")
    }

    /// Success iff the last attempt succeeded.
    pub fn overall_success(&self) -> bool {
        self.last().is_success()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

/// Drives the attempt loop. One instance per process; safe to share.
pub struct RetryController {
    config: RetryConfig,
    clock: Arc<dyn Clock>,
    rng: Mutex<SmallRng>,
}

impl RetryController {
    pub fn new(config: RetryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Invoke `action` up to `max_attempts` times.
    ///
    /// The action receives the 1-based attempt ordinal and a cancellation
    /// token that is a child of `outer` with an additional deadline of
    /// `per_attempt_timeout_ms`. The action owns combining further signals;
    /// the controller's backoff sleep watches `outer` only.
    pub async fn run<A, F>(
        &self,
        request_id: &str,
        outer: &CancellationToken,
        action: A,
    ) -> RetryResult
    where
        A: Fn(u32, CancellationToken) -> F,
        F: Future<Output = Result<ExecutionResult, ExecutorError>>,
    {
        let mut attempts: Vec<ExecutionResult> = Vec::new();
        let per_attempt_timeout = Duration::from_millis(self.config.per_attempt_timeout_ms);

        for attempt in 1..=self.config.max_attempts {
            let attempt_token = outer.child_token();
            let deadline_fired = Arc::new(AtomicBool::new(false));

            let timer = tokio::spawn({
                let token = attempt_token.clone();
                let fired = deadline_fired.clone();
                async move {
                    tokio::time::sleep(per_attempt_timeout).await;
                    fired.store(true, Ordering::SeqCst);
                    token.cancel();
                }
            });

            let started_at = self.clock.now();
            let mut result = match action(attempt, attempt_token.clone()).await {
                Ok(result) => result,
                Err(error) => {
                    tracing::warn!(
                        request_id = %request_id,
                        attempt,
                        error = %error,
                        "Executor failure escaped; recording as transient"
                    );
                    ExecutionResult::failure(
                        codes::EXECUTOR_EXCEPTION,
                        error.to_string(),
                        true,
                        started_at,
                        self.clock.now(),
                    )
                }
            };
            timer.abort();

            // An attempt abandoned by its own deadline is a transient
            // timeout no matter how the action reported it. Outer
            // cancellation is not: it ends the loop below.
            if deadline_fired.load(Ordering::SeqCst) && !result.is_success() {
                result = ExecutionResult::failure(
                    codes::TIMEOUT,
                    format!(
                        "attempt {} exceeded the {}ms deadline",
                        attempt, self.config.per_attempt_timeout_ms
                    ),
                    true,
                    result.started_at,
                    result.completed_at,
                );
            }

            result.attempt = attempt;
            let transient = result.is_transient();
            if transient {
                tracing::debug!(
                    request_id = %request_id,
                    attempt,
                    error_code = result.error_code().unwrap_or("unknown"),
                    "Attempt failed transiently"
                );
            }
            attempts.push(result);

            if !transient || attempt == self.config.max_attempts {
                break;
            }
            if outer.is_cancelled() {
                tracing::debug!(
                    request_id = %request_id,
                    attempt,
                    "Outer cancellation observed; abandoning further attempts"
                );
                break;
            }

            let delay = {
                let mut rng = self.rng.lock().unwrap();
                calculate_backoff(
                    attempt,
                    self.config.base_delay_ms,
                    self.config.max_delay_ms,
                    self.config.jitter_fraction,
                    &mut *rng,
                )
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = outer.cancelled() => break,
            }
        }

        RetryResult { attempts }
    }
}
