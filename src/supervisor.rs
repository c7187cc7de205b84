//! Last-line-of-defense failure barrier for supervised tasks.
//!
//! The async rendition of a render-tree error boundary: a [`Supervisor`]
//! wraps a unit of work, intercepts both escaped errors and panics, captures
//! them through the global logger exactly once each, and holds a recoverable
//! Failed state instead of letting the failure propagate. The host drives
//! recovery with [`retry`](Supervisor::retry), [`reset`](Supervisor::reset),
//! or a manual [`report`](Supervisor::report) export.
//!
//! Only the supervised task is intercepted. Failures in other async work
//! must be captured explicitly by the code that owns them (typically through
//! the retry engine or the request client).

use crate::classify;
use crate::error::{AppError, AppResult};
use crate::logger::{self, Context};
use crate::logging::log_info;
use chrono::DateTime;
use futures_util::FutureExt;
use serde_json::json;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed recovery window observed before a retry re-enters Healthy.
pub const RECOVERY_DELAY: Duration = Duration::from_millis(800);

/// Supervisor health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Tasks run normally.
    Healthy,
    /// A failure is being held; tasks are refused until recovery.
    Failed,
}

/// Everything retained about the held failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureDetail {
    /// Capture id, usable as a user-facing reference number.
    pub error_id: String,
    /// Fixed user-safe message for the failure's category.
    pub message: String,
    /// Raw internal failure message.
    pub raw_message: String,
    /// Captured backtrace, when available.
    pub stack: Option<String>,
    /// Label of the task that failed.
    pub task_label: String,
    /// Host-app location at capture time.
    pub location: String,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
}

/// Result of running a supervised task.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// The task finished; here is its value.
    Completed(T),
    /// The task failed (or the supervisor was already Failed); the held
    /// failure is attached.
    Failed(FailureDetail),
}

impl<T> TaskOutcome<T> {
    /// The completed value, if any.
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Whether the task completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Failure barrier around supervised async tasks.
///
/// State machine: Healthy -> (task failure) -> Failed -> (retry/reset) ->
/// Healthy. There is no other transition; a further failure while Failed
/// replaces the detail but does not change state.
pub struct Supervisor {
    failure: Option<FailureDetail>,
    retry_count: u32,
    recovery_delay: Duration,
    on_reset: Option<Box<dyn Fn() + Send + Sync>>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Create a healthy supervisor with the default recovery delay.
    pub fn new() -> Self {
        Self {
            failure: None,
            retry_count: 0,
            recovery_delay: RECOVERY_DELAY,
            on_reset: None,
        }
    }

    /// Override the recovery delay (tests use a short one).
    pub fn with_recovery_delay(mut self, delay: Duration) -> Self {
        self.recovery_delay = delay;
        self
    }

    /// Hook invoked on [`reset`](Self::reset) - the navigation-reset
    /// equivalent, discarding whatever state the host keeps for the
    /// supervised work.
    pub fn with_reset_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reset = Some(Box::new(hook));
        self
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        if self.failure.is_some() {
            SupervisorState::Failed
        } else {
            SupervisorState::Healthy
        }
    }

    /// The held failure, while Failed.
    pub fn failure(&self) -> Option<&FailureDetail> {
        self.failure.as_ref()
    }

    /// How many times the user has retried since the last reset.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Run a task under supervision.
    ///
    /// While Failed, the task is not executed and the held failure is
    /// returned - the fallback-instead-of-subtree contract. Otherwise both
    /// escaped errors and panics transition to Failed, each captured through
    /// the global logger exactly once.
    pub async fn run<T, F, Fut>(&mut self, label: &str, task: F) -> TaskOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if let Some(failure) = &self.failure {
            return TaskOutcome::Failed(failure.clone());
        }

        match AssertUnwindSafe(task()).catch_unwind().await {
            Ok(Ok(value)) => TaskOutcome::Completed(value),
            Ok(Err(error)) => TaskOutcome::Failed(self.capture_failure(label, &error, None)),
            Err(payload) => {
                let error = AppError::Unexpected {
                    message: classify::panic_message(payload.as_ref()),
                };
                TaskOutcome::Failed(self.capture_failure(label, &error, Some("panic")))
            }
        }
    }

    /// Record a failure explicitly and enter (or stay in) Failed.
    ///
    /// A failure recorded while already Failed replaces the held detail
    /// without changing state; each call captures once.
    pub fn capture_failure(
        &mut self,
        label: &str,
        error: &AppError,
        origin: Option<&str>,
    ) -> FailureDetail {
        let mut context = Context::new();
        context.insert("source".to_string(), json!("supervisor"));
        context.insert("task".to_string(), json!(label));
        if let Some(origin) = origin {
            context.insert("origin".to_string(), json!(origin));
        }
        let logged = logger::global().capture_exception(error, context);

        let detail = FailureDetail {
            error_id: logged.id.clone(),
            message: error.user_message().to_string(),
            raw_message: logged.message.clone(),
            stack: logged.stack.clone(),
            task_label: label.to_string(),
            location: logged.metadata.url.clone(),
            timestamp: logged.metadata.timestamp,
        };
        self.failure = Some(detail.clone());
        detail
    }

    /// Recover after the fixed delay and count the retry.
    ///
    /// No-op while Healthy. The delay suspends only the calling task.
    pub async fn retry(&mut self) {
        if self.failure.is_none() {
            return;
        }
        sleep(self.recovery_delay).await;
        self.failure = None;
        self.retry_count += 1;
        log_info!(retry_count = self.retry_count, "Supervisor recovered after retry");
    }

    /// Unconditionally recover, zero the retry counter, and fire the reset
    /// hook.
    pub fn reset(&mut self) {
        self.failure = None;
        self.retry_count = 0;
        if let Some(hook) = &self.on_reset {
            hook();
        }
        log_info!("Supervisor reset to healthy state");
    }

    /// Plain-text failure report for manual submission.
    ///
    /// `None` while Healthy. Writing the text to a clipboard or file is left
    /// to the host; this path has no network side effect.
    pub fn report(&self) -> Option<String> {
        let failure = self.failure.as_ref()?;
        let when = DateTime::from_timestamp_millis(failure.timestamp)
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| failure.timestamp.to_string());
        Some(format!(
            "Error Report\n\
             ============\n\
             Error ID: {}\n\
             Message: {}\n\
             Task: {}\n\
             Location: {}\n\
             Time: {}\n\
             \n\
             Stack trace:\n{}\n",
            failure.error_id,
            failure.raw_message,
            failure.task_label,
            failure.location,
            when,
            failure.stack.as_deref().unwrap_or("<not captured>"),
        ))
    }

    /// Raw failure detail for the collapsible developer panel.
    ///
    /// Only available in debug builds; release builds always get `None`, so
    /// raw failure text cannot leak into a production surface.
    pub fn technical_details(&self) -> Option<String> {
        if !cfg!(debug_assertions) {
            return None;
        }
        let failure = self.failure.as_ref()?;
        Some(format!(
            "{}\n\nTask: {}\n\n{}",
            failure.raw_message,
            failure.task_label,
            failure.stack.as_deref().unwrap_or("<no stack captured>"),
        ))
    }
}
