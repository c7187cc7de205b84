//! Centralized error logger with breadcrumbs and durable persistence.
//!
//! One [`ErrorLogger`] lives for the whole process. It owns the only shared
//! mutable state in the framework - the breadcrumb trail and the
//! logged-error ring buffer - and every other component reports through it.
//! Captures are enriched with session metadata, persisted synchronously to
//! the injected [`LogStore`], and (in production) forwarded fire-and-forget
//! to the configured [`ReportSink`].
//!
//! No public method here returns an error or panics on the capture path:
//! logging a failure must never become a failure of its own. Persistence and
//! forwarding problems degrade to local warnings.

use crate::classify;
use crate::config::LoggerConfig;
use crate::error::{AppError, AppResult, BackendError, ErrorCategory, ErrorSeverity};
use crate::logging::{log_error, log_info, log_warn};
use crate::report::{HttpReportSink, ReportPayload, ReportSink};
use crate::storage::{FileLogStore, LogStore};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Once};

/// Capacity of the logged-error ring buffer.
pub const MAX_STORED_ERRORS: usize = 50;

/// Capacity of the breadcrumb trail.
pub const MAX_BREADCRUMBS: usize = 20;

/// Ad-hoc context attached at a capture site.
///
/// Deliberately schemaless: call sites attach whatever key-value pairs help
/// diagnose that particular failure.
pub type Context = HashMap<String, serde_json::Value>;

// ============================================================================
// Capture records
// ============================================================================

/// Metadata attached to every capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetadata {
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
    /// Reporting application identifier.
    pub user_agent: String,
    /// Host-app location (route/screen) at capture time.
    pub url: String,
    /// Stable per-process session id.
    pub session_id: String,
    /// Breadcrumb trail at capture time, oldest first. Snapshotted by
    /// value - later breadcrumbs never mutate an existing record.
    pub breadcrumbs: Vec<String>,
    /// Ad-hoc context from the capture site.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: Context,
}

/// One captured error as the logger records it.
///
/// Owned exclusively by the logger; accessors hand out clones, never shared
/// references into the buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedError {
    /// Unique id for this capture, usable as a user-facing reference number.
    pub id: String,
    /// Raw failure message.
    pub message: String,
    /// Taxonomy category.
    pub category: ErrorCategory,
    /// Resolved severity.
    pub severity: ErrorSeverity,
    /// Captured backtrace, when the host enables one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Session and site metadata.
    pub metadata: ErrorMetadata,
    /// Whether the underlying failure was classified retryable.
    pub retryable: bool,
    /// How many times the failing operation had been retried when it was
    /// captured; 0 for direct captures.
    pub retry_count: u32,
}

/// Full diagnostics export: the current buffer plus device identification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    /// All currently buffered errors, oldest first.
    pub errors: Vec<LoggedError>,
    /// Export time, epoch milliseconds.
    pub timestamp: i64,
    /// Identification of the reporting host.
    pub device_info: DeviceInfo,
}

/// Host identification included in diagnostics exports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Reporting application identifier.
    pub user_agent: String,
    /// Operating system name.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Session the report was exported from.
    pub session_id: String,
}

// ============================================================================
// Logger
// ============================================================================

#[derive(Debug, Default)]
struct LoggerState {
    errors: VecDeque<LoggedError>,
    breadcrumbs: VecDeque<String>,
    location: String,
}

/// Process-wide error logger.
///
/// Construct once via [`install`] (or implicitly via [`global`]) and reach
/// it from anywhere with [`global`]. Direct construction with
/// [`ErrorLogger::with_backends`] exists for tests and embedded hosts.
pub struct ErrorLogger {
    session_id: String,
    config: LoggerConfig,
    state: Mutex<LoggerState>,
    store: Box<dyn LogStore>,
    sink: Option<Arc<dyn ReportSink>>,
}

static GLOBAL: OnceCell<ErrorLogger> = OnceCell::new();

/// Install the process-wide logger with an explicit configuration.
///
/// The first call wins; later calls return the already-installed instance
/// and warn. Installation loads the persisted buffer and registers the
/// panic hook.
pub fn install(config: LoggerConfig) -> &'static ErrorLogger {
    let mut installed_now = false;
    let logger = GLOBAL.get_or_init(|| {
        installed_now = true;
        ErrorLogger::new(config)
    });
    if !installed_now {
        log_warn!("Error logger already installed, ignoring new configuration");
    }
    install_panic_hook();
    logger
}

/// The process-wide logger, installing one with default configuration on
/// first use.
pub fn global() -> &'static ErrorLogger {
    let logger = GLOBAL.get_or_init(|| ErrorLogger::new(LoggerConfig::default()));
    install_panic_hook();
    logger
}

/// Register the chained panic hook routing uncaught panics through the
/// global logger with a `panic_hook` source tag.
///
/// This is the host-platform analogue of a browser's uncaught-exception
/// listener; escaped async failures reach the logger through
/// [`crate::Supervisor`] instead.
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = classify::panic_message(info.payload());
            let mut context = Context::new();
            context.insert("source".to_string(), json!("panic_hook"));
            if let Some(location) = info.location() {
                context.insert(
                    "panic_location".to_string(),
                    json!(format!("{}:{}:{}", location.file(), location.line(), location.column())),
                );
            }
            let error = AppError::Unexpected { message };
            global().capture_with_severity(&error, context, Some(ErrorSeverity::High));
            previous(info);
        }));
    });
}

impl ErrorLogger {
    /// Create a logger from configuration, with the default file store and
    /// (when an endpoint is configured) the HTTP report sink.
    pub fn new(config: LoggerConfig) -> Self {
        let store: Box<dyn LogStore> = Box::new(FileLogStore::new(config.log_path.clone()));
        let sink = config
            .report_endpoint
            .as_deref()
            .map(|endpoint| Arc::new(HttpReportSink::new(endpoint)) as Arc<dyn ReportSink>);
        Self::with_backends(config, store, sink)
    }

    /// Create a logger with explicit persistence and reporting backends.
    ///
    /// Loads any persisted buffer immediately; a load failure degrades to an
    /// empty buffer with a warning.
    pub fn with_backends(
        config: LoggerConfig,
        store: Box<dyn LogStore>,
        sink: Option<Arc<dyn ReportSink>>,
    ) -> Self {
        let errors = match store.load() {
            Ok(mut persisted) => {
                if persisted.len() > MAX_STORED_ERRORS {
                    persisted.drain(..persisted.len() - MAX_STORED_ERRORS);
                }
                log_info!(
                    persisted_errors = persisted.len(),
                    "Loaded persisted error buffer"
                );
                persisted.into()
            }
            Err(err) => {
                log_warn!(error = %err, "Could not load persisted error buffer, starting empty");
                VecDeque::new()
            }
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        log_info!(session_id = %session_id, environment = ?config.environment, "Error logger ready");

        Self {
            session_id,
            state: Mutex::new(LoggerState {
                errors,
                breadcrumbs: VecDeque::new(),
                location: config.location.clone(),
            }),
            store,
            sink,
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoggerState> {
        // A panic while holding this lock must not take the logger down
        // with it; the state is still structurally valid.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stable session id for this process.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Update the "current location" recorded in subsequent captures.
    pub fn set_location(&self, location: impl Into<String>) {
        self.lock().location = location.into();
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Capture an error with site context, resolving severity from the
    /// error itself.
    ///
    /// See [`capture_with_severity`](Self::capture_with_severity).
    pub fn capture_exception(
        &self,
        error: &(dyn StdError + 'static),
        context: Context,
    ) -> LoggedError {
        self.capture_with_severity(error, context, None)
    }

    /// Capture an error, overriding the resolved severity.
    ///
    /// Severity resolution: the explicit argument if given, else the error's
    /// own severity when it is a taxonomy value, else `Medium`.
    ///
    /// The returned record carries the capture id callers surface to users
    /// as a reference number. This method never fails: persistence and
    /// forwarding problems are downgraded to warnings and the in-memory
    /// record is kept regardless.
    pub fn capture_with_severity(
        &self,
        error: &(dyn StdError + 'static),
        context: Context,
        severity: Option<ErrorSeverity>,
    ) -> LoggedError {
        let message = classify::error_message(error);
        let category = classify::categorize(error);
        let severity = severity
            .or_else(|| error.downcast_ref::<AppError>().map(AppError::severity))
            .unwrap_or(ErrorSeverity::Medium);
        let retryable = classify::is_retryable(error);
        // The retry engine reports 1-based attempt counts in its context.
        let retry_count = context
            .get("attempts")
            .or_else(|| context.get("attempt"))
            .and_then(serde_json::Value::as_u64)
            .map(|attempts| attempts.saturating_sub(1) as u32)
            .unwrap_or(0);

        let (entry, snapshot) = {
            let mut state = self.lock();
            let metadata = ErrorMetadata {
                timestamp: Utc::now().timestamp_millis(),
                user_agent: self.config.user_agent.clone(),
                url: state.location.clone(),
                session_id: self.session_id.clone(),
                breadcrumbs: state.breadcrumbs.iter().cloned().collect(),
                context,
            };
            let entry = LoggedError {
                id: next_capture_id(),
                message,
                category,
                severity,
                stack: capture_stack(),
                metadata,
                retryable,
                retry_count,
            };
            state.errors.push_back(entry.clone());
            while state.errors.len() > MAX_STORED_ERRORS {
                state.errors.pop_front();
            }
            let snapshot: Vec<LoggedError> = state.errors.iter().cloned().collect();
            (entry, snapshot)
        };

        if let Err(err) = self.store.save(&snapshot) {
            log_warn!(error = %err, capture_id = %entry.id, "Failed to persist error buffer");
        }

        if self.config.environment.is_production() {
            self.forward(&entry);
        } else {
            self.echo(&entry);
        }

        entry
    }

    /// Echo a capture to the diagnostic channel at a level matching its
    /// severity.
    fn echo(&self, entry: &LoggedError) {
        match entry.severity {
            ErrorSeverity::Critical | ErrorSeverity::High => log_error!(
                capture_id = %entry.id,
                category = ?entry.category,
                severity = ?entry.severity,
                message = %entry.message,
                "Captured exception"
            ),
            ErrorSeverity::Medium => log_warn!(
                capture_id = %entry.id,
                category = ?entry.category,
                message = %entry.message,
                "Captured exception"
            ),
            ErrorSeverity::Low => log_info!(
                capture_id = %entry.id,
                category = ?entry.category,
                message = %entry.message,
                "Captured exception"
            ),
        }
    }

    /// Forward a capture to the report sink, fire-and-forget.
    fn forward(&self, entry: &LoggedError) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let payload = ReportPayload {
            message: entry.message.clone(),
            stack: entry.stack.clone(),
            timestamp: entry.metadata.timestamp,
            url: entry.metadata.url.clone(),
            user_agent: entry.metadata.user_agent.clone(),
            context: entry.metadata.context.clone(),
            category: entry.category,
            severity: entry.severity,
            session_id: entry.metadata.session_id.clone(),
            breadcrumbs: entry.metadata.breadcrumbs.clone(),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.submit(payload).await {
                        log_warn!(error = %err, "Error report sink rejected payload");
                    }
                });
            }
            Err(_) => {
                log_warn!("No async runtime available, error report not forwarded");
            }
        }
    }

    // ========================================================================
    // Breadcrumbs
    // ========================================================================

    /// Append a timestamped breadcrumb describing recent activity.
    ///
    /// The trail keeps the most recent [`MAX_BREADCRUMBS`] entries, oldest
    /// evicted first.
    pub fn add_breadcrumb(&self, message: impl Into<String>) {
        self.push_breadcrumb(message.into(), None);
    }

    /// Append a breadcrumb with structured data rendered alongside it.
    pub fn add_breadcrumb_with(&self, message: impl Into<String>, data: serde_json::Value) {
        self.push_breadcrumb(message.into(), Some(data));
    }

    fn push_breadcrumb(&self, message: String, data: Option<serde_json::Value>) {
        let mut crumb = format!(
            "{} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        );
        if let Some(data) = data {
            crumb.push_str(" | ");
            crumb.push_str(&data.to_string());
        }
        let mut state = self.lock();
        state.breadcrumbs.push_back(crumb);
        while state.breadcrumbs.len() > MAX_BREADCRUMBS {
            state.breadcrumbs.pop_front();
        }
    }

    /// Current breadcrumb trail, oldest first.
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.lock().breadcrumbs.iter().cloned().collect()
    }

    /// Drop the breadcrumb trail.
    pub fn clear_breadcrumbs(&self) {
        self.lock().breadcrumbs.clear();
    }

    // ========================================================================
    // Buffer access
    // ========================================================================

    /// All buffered errors, oldest first.
    pub fn errors(&self) -> Vec<LoggedError> {
        self.lock().errors.iter().cloned().collect()
    }

    /// Buffered errors of exactly this severity.
    pub fn errors_by_severity(&self, severity: ErrorSeverity) -> Vec<LoggedError> {
        self.lock()
            .errors
            .iter()
            .filter(|entry| entry.severity == severity)
            .cloned()
            .collect()
    }

    /// Buffered errors of exactly this category.
    pub fn errors_by_category(&self, category: ErrorCategory) -> Vec<LoggedError> {
        self.lock()
            .errors
            .iter()
            .filter(|entry| entry.category == category)
            .cloned()
            .collect()
    }

    /// Drop all buffered errors, including the persisted copy.
    pub fn clear_errors(&self) {
        self.lock().errors.clear();
        if let Err(err) = self.store.clear() {
            log_warn!(error = %err, "Failed to clear persisted error buffer");
        }
    }

    // ========================================================================
    // Backend-code wrappers
    // ========================================================================

    /// Capture an auth-backend failure and return the fixed user-facing
    /// string for its code.
    ///
    /// `action` names what the user was doing ("sign_in", "change_password")
    /// and lands in the capture context.
    pub fn capture_auth_error(
        &self,
        error: &(dyn StdError + 'static),
        action: &str,
    ) -> String {
        let code = backend_code(error);
        let friendly = auth_code_message(&code);
        let mut context = Context::new();
        context.insert("type".to_string(), json!("auth_error"));
        context.insert("action".to_string(), json!(action));
        context.insert("code".to_string(), json!(code));
        self.capture_with_severity(error, context, Some(ErrorSeverity::High));
        friendly.to_string()
    }

    /// Capture a document-store failure and return the fixed user-facing
    /// string for its code.
    ///
    /// `operation` names the store operation ("load_products", "save_post")
    /// and lands in the capture context.
    pub fn capture_store_error(
        &self,
        error: &(dyn StdError + 'static),
        operation: &str,
    ) -> String {
        let code = backend_code(error);
        let friendly = store_code_message(&code);
        let mut context = Context::new();
        context.insert("type".to_string(), json!("store_error"));
        context.insert("operation".to_string(), json!(operation));
        context.insert("code".to_string(), json!(code));
        self.capture_exception(error, context);
        friendly.to_string()
    }

    // ========================================================================
    // Diagnostics export
    // ========================================================================

    /// Assemble the full diagnostics report for the current buffer.
    pub fn export_report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            errors: self.errors(),
            timestamp: Utc::now().timestamp_millis(),
            device_info: DeviceInfo {
                user_agent: self.config.user_agent.clone(),
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
                session_id: self.session_id.clone(),
            },
        }
    }

    /// Write the diagnostics report to `dir` as `error-logs-<epoch>.json`
    /// and return the written path.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Network`] (I/O) or [`AppError::Validation`]
    /// (serialization) if the file cannot be produced. Unlike the capture
    /// path, export is an explicit host request and surfaces its failure.
    pub fn save_report(&self, dir: &Path) -> AppResult<PathBuf> {
        let report = self.export_report();
        let path = dir.join(format!("error-logs-{}.json", report.timestamp));
        let payload = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, payload)?;
        log_info!(path = %path.display(), errors = report.errors.len(), "Diagnostics report written");
        Ok(path)
    }
}

// ============================================================================
// Capture helpers
// ============================================================================

/// Unique-within-process capture id: epoch millis plus a random suffix.
fn next_capture_id() -> String {
    format!("{}-{:08x}", Utc::now().timestamp_millis(), fastrand::u32(..))
}

/// Capture a backtrace when the host has them enabled (RUST_BACKTRACE).
fn capture_stack() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// Extract the backend machine code from a caught error, if it carries one.
fn backend_code(error: &(dyn StdError + 'static)) -> String {
    if let Some(backend) = error.downcast_ref::<BackendError>() {
        return backend.code.trim_start_matches("auth/").to_string();
    }
    if let Some(AppError::Authentication { code, .. }) = error.downcast_ref::<AppError>() {
        return code.clone();
    }
    String::new()
}

/// Fixed table of auth-backend codes to user-facing strings.
fn auth_code_message(code: &str) -> &'static str {
    match code {
        "invalid-credential" | "wrong-password" | "user-not-found" => {
            "Invalid email or password."
        }
        "too-many-requests" => "Too many attempts. Please try again later.",
        "network-request-failed" => {
            "Network error. Please check your connection and try again."
        }
        "session-expired" | "token-expired" | "requires-recent-login" => {
            "Your session has expired. Please sign in again."
        }
        "email-already-in-use" => "An account with this email already exists.",
        "weak-password" => "Password is too weak. Please choose a stronger password.",
        _ => "Authentication failed. Please try again.",
    }
}

/// Fixed table of document-store codes to user-facing strings.
fn store_code_message(code: &str) -> &'static str {
    match code {
        "permission-denied" => "You don't have permission to perform this action.",
        "unavailable" => "Service temporarily unavailable. Please try again later.",
        "not-found" => "The requested document was not found.",
        "already-exists" => "This item already exists.",
        "resource-exhausted" => "Too many requests. Please slow down and try again.",
        "unauthenticated" => "Please sign in to continue.",
        "deadline-exceeded" => "The operation timed out. Please try again.",
        _ => "Something went wrong. Please try again.",
    }
}
