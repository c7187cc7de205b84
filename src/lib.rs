//! # guardrail
//!
//! Error handling and recovery framework for async Rust applications.
//!
//! ## Key Features
//!
//! - **Closed Taxonomy**: Tagged-union [`AppError`] with fixed category,
//!   severity, and retryability per kind
//! - **Total Classification**: Map any caught value onto the taxonomy, never
//!   panicking, never echoing raw failure text to users
//! - **Centralized Logger**: Process-wide capture with breadcrumb trails, a
//!   persisted ring buffer, and production report forwarding
//! - **Retry Engine**: Exponential backoff with jitter, non-retryable
//!   short-circuit, and explicit cancellation
//! - **Failure Supervisor**: Panic-safe barrier turning uncaught task
//!   failures into a recoverable state with retry, reset, and report actions
//!
//! ## Example
//!
//! ```rust,no_run
//! use guardrail::{logger, LoggerConfig, Retrier, RetryPolicy, AppError};
//!
//! # async fn example() -> guardrail::AppResult<()> {
//! let log = logger::install(LoggerConfig::default());
//! log.add_breadcrumb("app started");
//!
//! let retrier = Retrier::new(RetryPolicy::default());
//! let value = retrier
//!     .execute(|| async {
//!         // Any fallible async operation
//!         Err::<String, _>(AppError::network("connection refused", None))
//!     })
//!     .await;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

// Allow missing errors documentation - errors are self-documenting via type signatures
#![allow(clippy::missing_errors_doc)]

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod logger;
pub mod report;
pub mod retry;
pub mod storage;
pub mod supervisor;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use client::{Method, Notifier, RequestClient, RequestOutcome};
pub use config::{Environment, LoggerConfig};
pub use error::{AppError, AppResult, BackendError, ErrorCategory, ErrorSeverity};
pub use logger::{
    Context, DeviceInfo, DiagnosticsReport, ErrorLogger, ErrorMetadata, LoggedError,
    MAX_BREADCRUMBS, MAX_STORED_ERRORS,
};
pub use report::{HttpReportSink, ReportPayload, ReportSink};
pub use retry::{Retrier, RetryHooks, RetryPolicy, RetryState};
pub use storage::{FileLogStore, LogStore, MemoryLogStore};
pub use supervisor::{
    FailureDetail, Supervisor, SupervisorState, TaskOutcome, RECOVERY_DELAY,
};
