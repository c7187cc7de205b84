//! Retry engine with exponential backoff and cancellation.
//!
//! Wraps a fallible async operation and re-invokes it on transient failures:
//! - Exponential backoff between attempts, with up to 10% jitter
//! - Non-retryable failures stop the run immediately
//! - Explicit cancellation aborts the in-flight wait or operation
//!
//! Retryability is decided by the classifier, so the engine and the rest of
//! the framework always agree on what "transient" means.

use crate::classify;
use crate::error::{AppError, AppResult};
use crate::logger::{self, Context};
use crate::logging::log_debug;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first. A value of 1 means
    /// a plain call with classification and logging on failure.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Upper bound on the inter-attempt delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Observable state of the current (or last) retry run.
///
/// Transient: owned by a single in-flight `execute` call and reset at the
/// start of each run.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Whether a run is currently in flight.
    pub is_retrying: bool,
    /// Attempts made so far in the current run.
    pub attempts: u32,
    /// The most recent failure observed in the current run.
    pub last_error: Option<AppError>,
}

/// Optional per-run callbacks.
#[derive(Default)]
pub struct RetryHooks {
    /// Invoked before every attempt with the 1-based attempt number.
    pub on_retry: Option<Box<dyn Fn(u32) + Send + Sync>>,
    /// Invoked with the final error when the run gives up.
    pub on_error: Option<Box<dyn Fn(&AppError) + Send + Sync>>,
}

impl RetryHooks {
    /// Hooks with only an on-retry callback.
    pub fn on_retry(callback: impl Fn(u32) + Send + Sync + 'static) -> Self {
        Self {
            on_retry: Some(Box::new(callback)),
            on_error: None,
        }
    }

    /// Add an on-error callback.
    pub fn with_on_error(mut self, callback: impl Fn(&AppError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

/// Retry executor binding a policy to a cancellation token.
pub struct Retrier {
    policy: RetryPolicy,
    state: Mutex<RetryState>,
    cancel: Mutex<CancellationToken>,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Retrier {
    /// Create a retrier with the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(RetryState::default()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// The configured policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Snapshot of the current retry state.
    pub fn state(&self) -> RetryState {
        self.lock_state().clone()
    }

    /// Abort the in-flight wait or operation.
    ///
    /// The cancelled run resolves with its last observed error and clears
    /// the retrying flag. A result that already returned is unaffected, and
    /// later runs proceed normally with a fresh token.
    pub fn cancel(&self) {
        self.lock_cancel().cancel();
        self.lock_state().is_retrying = false;
    }

    /// Execute `operation`, retrying transient failures per the policy.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.execute_with_hooks(operation, RetryHooks::default()).await
    }

    /// Execute `operation` with per-run callbacks.
    ///
    /// Algorithm, per attempt 1..=max_attempts:
    /// 1. Invoke `on_retry(attempt)`, then the operation.
    /// 2. Success returns immediately.
    /// 3. A non-retryable failure is captured and returned immediately,
    ///    regardless of remaining budget.
    /// 4. A retryable failure on the final attempt is captured and returned.
    /// 5. Otherwise sleep the current delay (suspending only this task) and
    ///    grow it by the backoff multiplier.
    pub async fn execute_with_hooks<T, F, Fut>(
        &self,
        mut operation: F,
        hooks: RetryHooks,
    ) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let token = self.fresh_token();
        *self.lock_state() = RetryState {
            is_retrying: true,
            attempts: 0,
            last_error: None,
        };

        let max_attempts = self.policy.max_attempts.max(1);
        let mut current_delay = self.policy.initial_delay;

        for attempt in 1..=max_attempts {
            self.lock_state().attempts = attempt;
            if let Some(on_retry) = &hooks.on_retry {
                on_retry(attempt);
            }

            let result = tokio::select! {
                result = operation() => result,
                () = token.cancelled() => return self.finish_cancelled(),
            };

            match result {
                Ok(value) => {
                    let mut state = self.lock_state();
                    state.is_retrying = false;
                    state.last_error = None;
                    log_debug!(attempt, "Operation succeeded");
                    return Ok(value);
                }
                Err(error) => {
                    self.lock_state().last_error = Some(error.clone());

                    if !classify::is_retryable(&error) {
                        let mut context = Context::new();
                        context.insert("type".to_string(), json!("non_retryable_error"));
                        context.insert("attempt".to_string(), json!(attempt));
                        logger::global().capture_exception(&error, context);
                        return self.give_up(error, &hooks);
                    }

                    if attempt == max_attempts {
                        let mut context = Context::new();
                        context.insert("type".to_string(), json!("max_retries_exceeded"));
                        context.insert("attempts".to_string(), json!(max_attempts));
                        logger::global().capture_exception(&error, context);
                        return self.give_up(error, &hooks);
                    }

                    let delay = with_jitter(current_delay);
                    log_debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying after backoff delay"
                    );
                    tokio::select! {
                        () = sleep(delay) => {}
                        () = token.cancelled() => return self.finish_cancelled(),
                    }
                    current_delay = self.next_delay(current_delay);
                }
            }
        }

        // The final attempt always returns above; this only satisfies the
        // compiler.
        let last = self.lock_state().last_error.clone();
        Err(last.unwrap_or_else(|| AppError::unexpected("Retry budget exhausted")))
    }

    /// Grow the delay for the next attempt, capped by the policy.
    fn next_delay(&self, current: Duration) -> Duration {
        let scaled = current.as_secs_f64() * self.policy.backoff_multiplier;
        Duration::from_secs_f64(scaled.min(self.policy.max_delay.as_secs_f64()))
    }

    fn give_up<T>(&self, error: AppError, hooks: &RetryHooks) -> AppResult<T> {
        if let Some(on_error) = &hooks.on_error {
            on_error(&error);
        }
        self.lock_state().is_retrying = false;
        Err(error)
    }

    fn finish_cancelled<T>(&self) -> AppResult<T> {
        let mut state = self.lock_state();
        state.is_retrying = false;
        log_debug!(attempts = state.attempts, "Retry run cancelled");
        Err(state
            .last_error
            .clone()
            .unwrap_or_else(|| AppError::Unexpected {
                message: "Operation cancelled before completion".to_string(),
            }))
    }

    /// Token for the next run, replacing one already burnt by `cancel`.
    fn fresh_token(&self) -> CancellationToken {
        let mut guard = self.lock_cancel();
        if guard.is_cancelled() {
            *guard = CancellationToken::new();
        }
        guard.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, RetryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_cancel(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Add up to 10% jitter so synchronized clients don't retry in lockstep.
fn with_jitter(delay: Duration) -> Duration {
    let jitter = fastrand::f64() * 0.1;
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter))
}
