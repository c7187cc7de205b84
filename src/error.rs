//! Error taxonomy for guardrail.
//!
//! This module provides structured error handling for application operations,
//! including categorization, severity levels, and retry guidance.
//!
//! # Error Types
//!
//! The main error type is [`AppError`], a tagged union covering all failure
//! kinds the framework distinguishes:
//! - Network failures (transport errors, unexpected HTTP statuses)
//! - Validation failures (bad input, field-level errors)
//! - Authentication and authorization failures
//! - Missing resources
//! - Server-side failures
//! - Everything else, as an `Unexpected` catch-all
//!
//! # Error Handling Example
//!
//! ```rust,no_run
//! use guardrail::{AppError, AppResult};
//!
//! fn handle_error(err: AppError) {
//!     // Check if we should retry
//!     if err.is_retryable() {
//!         println!("Retryable error: {}", err);
//!         // Hand the operation to the retry engine...
//!     }
//!
//!     // Get user-friendly message
//!     let user_msg = err.user_message();
//!     println!("Tell user: {}", user_msg);
//!
//!     // Check error category for routing
//!     match err.category() {
//!         guardrail::ErrorCategory::Network => {
//!             println!("Connectivity issue, likely transient");
//!         }
//!         guardrail::ErrorCategory::Validation => {
//!             println!("Fix the input and try again");
//!         }
//!         _ => {
//!             println!("Route to the logger for triage");
//!         }
//!     }
//! }
//! ```
//!
//! # Result Type
//!
//! Use [`AppResult<T>`] as a convenient alias for `Result<T, AppError>`:
//!
//! ```rust
//! use guardrail::AppResult;
//!
//! fn my_function() -> AppResult<String> {
//!     Ok("Success".to_string())
//! }
//! ```

use crate::logging::{log_error, log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// Error categorization types
// ============================================================================

/// High-level categorization of errors for routing and handling decisions.
///
/// Use [`AppError::category()`] to get the category for any taxonomy error,
/// or [`crate::classify::categorize`] for arbitrary caught values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Transport-level or HTTP-level failures reaching a remote service.
    Network,

    /// Input rejected before or after reaching the backend.
    Validation,

    /// The caller is not signed in, or their credentials were rejected.
    Authentication,

    /// The caller is signed in but lacks the required permissions.
    Authorization,

    /// The requested resource does not exist.
    NotFound,

    /// The backend failed while processing a well-formed request.
    ServerError,

    /// A request the caller can fix that fits none of the other buckets.
    ClientError,

    /// Anything the classifier could not place.
    Unknown,
}

/// Severity level for triage, logging, and alerting decisions.
///
/// Ordered low to critical; the derived ordering follows declaration order,
/// so `Low < Medium < High < Critical` holds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Expected failure (validation, missing resource). Log and move on.
    Low,

    /// Unexpected but recoverable situation. Worth monitoring.
    Medium,

    /// Action failed in a way the user will notice. Investigate.
    High,

    /// Service health is at risk. Requires immediate attention.
    Critical,
}

// ============================================================================
// Application error types
// ============================================================================

/// Convenient result type for framework operations.
///
/// Alias for `Result<T, AppError>`. Use this throughout your application
/// for consistent error handling.
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Errors that can occur during application operations.
///
/// A tagged union with one variant per error kind; category, severity, and
/// retryability are derived from the kind rather than carried per-instance.
/// Each variant can be:
/// - Categorized via [`category()`](Self::category)
/// - Assessed for severity via [`severity()`](Self::severity)
/// - Checked for retryability via [`is_retryable()`](Self::is_retryable)
/// - Converted to user-friendly messages via [`user_message()`](Self::user_message)
///
/// # Creating Errors
///
/// Use the constructor methods which automatically log the error:
///
/// ```rust
/// use guardrail::AppError;
///
/// // These methods log automatically
/// let err = AppError::network("connection refused", None);
/// let err = AppError::not_found("Post");
/// let err = AppError::server("upstream exploded", 503);
/// ```
///
/// # Error Kinds
///
/// | Variant | Category | Severity | Retryable |
/// |---------|----------|----------|-----------|
/// | `Network` | Network | Medium | Yes, unless status 401/403 |
/// | `Validation` | Validation | Low | No |
/// | `Authentication` | Authentication | High | Only on session expiry |
/// | `Authorization` | Authorization | High | No |
/// | `NotFound` | NotFound | Low | No |
/// | `Server` | ServerError | Critical for 503, else High | Yes |
/// | `Unexpected` | Unknown | Medium | No |
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// A request did not reach the backend, or came back with an HTTP
    /// status that fits no more specific kind.
    #[error("Network request failed: {message}")]
    Network {
        /// HTTP status, when the failure happened after a response arrived.
        status_code: Option<u16>,
        /// Description of the failure.
        message: String,
    },

    /// Input was rejected, with optional per-field detail.
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of what was wrong with the input.
        message: String,
        /// Field name to field-specific error text.
        fields: HashMap<String, String>,
    },

    /// The caller could not be authenticated.
    ///
    /// `code` is the short machine code reported by the auth backend
    /// (e.g. `invalid-credential`, `session-expired`).
    #[error("Authentication failed [{code}]: {message}")]
    Authentication {
        /// Description of the failure.
        message: String,
        /// Backend auth error code.
        code: String,
    },

    /// The caller is authenticated but not allowed to do this.
    #[error("Permission denied: {message}")]
    Authorization {
        /// Description of the denied action.
        message: String,
        /// Permissions the caller would need.
        required_permissions: Vec<String>,
    },

    /// The requested resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Human-readable resource type, e.g. "Post" or "Product".
        resource: String,
    },

    /// The backend failed while handling the request.
    #[error("Server error {status_code}: {message}")]
    Server {
        /// Description of the failure.
        message: String,
        /// HTTP status in the 5xx range.
        status_code: u16,
    },

    /// A failure that fits no taxonomy kind. Rendition of the loosely-typed
    /// base error: category unknown, never retried.
    #[error("{message}")]
    Unexpected {
        /// Description of the failure.
        message: String,
    },
}

/// Auth backend codes that signal an expired session.
///
/// Session expiry is the one authentication failure worth retrying, since
/// the host app may refresh credentials between attempts.
const SESSION_EXPIRY_CODES: [&str; 3] = ["session-expired", "token-expired", "requires-recent-login"];

impl AppError {
    /// Get the error category for routing and handling decisions.
    ///
    /// Fixed per kind; see the table in the type-level docs.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } => ErrorCategory::Network,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Authorization { .. } => ErrorCategory::Authorization,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Server { .. } => ErrorCategory::ServerError,
            Self::Unexpected { .. } => ErrorCategory::Unknown,
        }
    }

    /// Get the error severity for triage and alerting.
    ///
    /// Validation and missing-resource failures are expected application
    /// flow and stay low; a 503 from the backend is the one case that
    /// escalates to critical.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network { .. } => ErrorSeverity::Medium,
            Self::Validation { .. } => ErrorSeverity::Low,
            Self::Authentication { .. } => ErrorSeverity::High,
            Self::Authorization { .. } => ErrorSeverity::High,
            Self::NotFound { .. } => ErrorSeverity::Low,
            Self::Server { status_code, .. } => {
                if *status_code == 503 {
                    ErrorSeverity::Critical
                } else {
                    ErrorSeverity::High
                }
            }
            Self::Unexpected { .. } => ErrorSeverity::Medium,
        }
    }

    /// Whether this error is transient and should trigger a retry.
    ///
    /// Returns `true` for:
    /// - Network failures, unless the status was 401 or 403
    /// - Server failures
    /// - Authentication failures whose code signals session expiry
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { status_code, .. } => !matches!(status_code, Some(401) | Some(403)),
            Self::Validation { .. } => false,
            Self::Authentication { code, .. } => {
                SESSION_EXPIRY_CODES.contains(&code.as_str())
            }
            Self::Authorization { .. } => false,
            Self::NotFound { .. } => false,
            Self::Server { .. } => true,
            Self::Unexpected { .. } => false,
        }
    }

    /// The HTTP status attached to this error, when one exists.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Network { status_code, .. } => *status_code,
            Self::Server { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Convert to a user-friendly message suitable for display.
    ///
    /// Returns the fixed sentence for this error's category - raw failure
    /// text never reaches end users through this path.
    pub fn user_message(&self) -> &'static str {
        crate::classify::friendly_message(self.category())
    }

    // =========================================================================
    // Constructor methods with automatic logging
    // =========================================================================
    //
    // These methods automatically log the error at the appropriate level.
    // Use them instead of constructing variants directly.

    /// Create a network error (logs at WARN level).
    pub fn network(message: impl Into<String>, status_code: Option<u16>) -> Self {
        let message = message.into();
        log_warn!(
            error_type = "network_error",
            status_code = ?status_code,
            message = %message,
            "Network request failed"
        );
        Self::Network {
            status_code,
            message,
        }
    }

    /// Create a validation error with no field detail (logs at INFO level).
    pub fn validation(message: impl Into<String>) -> Self {
        Self::validation_fields(message, HashMap::new())
    }

    /// Create a validation error carrying per-field messages (logs at INFO level).
    pub fn validation_fields(
        message: impl Into<String>,
        fields: HashMap<String, String>,
    ) -> Self {
        let message = message.into();
        log_info!(
            error_type = "validation_error",
            message = %message,
            field_count = fields.len(),
            "Input validation failed"
        );
        Self::Validation { message, fields }
    }

    /// Create an authentication error (logs at ERROR level).
    pub fn authentication(message: impl Into<String>, code: impl Into<String>) -> Self {
        let message = message.into();
        let code = code.into();
        log_error!(
            error_type = "authentication_error",
            code = %code,
            message = %message,
            "Authentication failed"
        );
        Self::Authentication { message, code }
    }

    /// Create an authorization error (logs at ERROR level).
    pub fn authorization(
        message: impl Into<String>,
        required_permissions: Vec<String>,
    ) -> Self {
        let message = message.into();
        log_error!(
            error_type = "authorization_error",
            required_permissions = ?required_permissions,
            message = %message,
            "Permission denied"
        );
        Self::Authorization {
            message,
            required_permissions,
        }
    }

    /// Create a not-found error (logs at INFO level).
    pub fn not_found(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        log_info!(
            error_type = "not_found",
            resource = %resource,
            "Requested resource does not exist"
        );
        Self::NotFound { resource }
    }

    /// Create a server error (logs at ERROR level).
    pub fn server(message: impl Into<String>, status_code: u16) -> Self {
        let message = message.into();
        log_error!(
            error_type = "server_error",
            status_code = status_code,
            message = %message,
            "Backend request failed"
        );
        Self::Server {
            message,
            status_code,
        }
    }

    /// Create an unclassified error (logs at WARN level).
    pub fn unexpected(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_type = "unexpected_error",
            message = %message,
            "Unclassified failure"
        );
        Self::Unexpected { message }
    }
}

// ============================================================================
// Conversions from foreign error types
// ============================================================================
//
// Classification here is by TYPE, never by message sniffing: a reqwest
// transport failure becomes a retryable network error because of what it is,
// not because of what its Display text happens to contain.

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            let code = status.as_u16();
            if status.is_server_error() {
                return Self::server(err.to_string(), code);
            }
            return Self::network(err.to_string(), Some(code));
        }
        // Connect, timeout, and body failures never produced a status.
        Self::network(err.to_string(), None)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("Invalid JSON payload: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::network(format!("I/O failure: {err}"), None)
    }
}

// ============================================================================
// Backend error shape
// ============================================================================

/// Error shape surfaced by hosted-backend SDK calls: a short machine code
/// plus a human message.
///
/// The logger's [`capture_auth_error`](crate::ErrorLogger::capture_auth_error)
/// and [`capture_store_error`](crate::ErrorLogger::capture_store_error)
/// wrappers translate these codes into fixed user-facing strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Backend machine code, e.g. `permission-denied` or `invalid-credential`.
    pub code: String,
    /// Backend-provided human message.
    pub message: String,
}

impl BackendError {
    /// Build a backend error from its code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
