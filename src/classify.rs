//! Classification of arbitrary caught values.
//!
//! The taxonomy in [`crate::error`] covers errors this crate constructs
//! itself. Anything can still escape from host-app code: foreign library
//! errors, panic payloads, strings. The functions here map all of those onto
//! the closed category set, totally and without panicking.
//!
//! Resolution order for [`categorize`]:
//! 1. A taxonomy value keeps its fixed category.
//! 2. Otherwise the message text is inspected for status-code and
//!    connectivity markers.
//! 3. Everything else is `Unknown`.

use crate::error::{AppError, ErrorCategory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::error::Error as StdError;

/// Fixed message used when no text can be extracted from a caught value.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Matches a 5xx status token ("500", "503") inside a message string.
static SERVER_STATUS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b5\d{2}\b").expect("server status pattern is valid"));

/// Map an arbitrary caught error onto the closed category set.
///
/// Total over any `dyn Error`: taxonomy values resolve directly from their
/// kind, everything else falls back to message inspection via
/// [`categorize_message`].
pub fn categorize(err: &(dyn StdError + 'static)) -> ErrorCategory {
    if let Some(app) = err.downcast_ref::<AppError>() {
        return app.category();
    }
    categorize_message(&err.to_string())
}

/// Categorize from message text alone.
///
/// Used for foreign errors and panic payloads where the only signal is the
/// text itself. Status tokens win over the generic connectivity marker.
pub fn categorize_message(message: &str) -> ErrorCategory {
    if message.contains("404") {
        ErrorCategory::NotFound
    } else if message.contains("401") {
        ErrorCategory::Authentication
    } else if message.contains("403") {
        ErrorCategory::Authorization
    } else if SERVER_STATUS_TOKEN.is_match(message) {
        ErrorCategory::ServerError
    } else if message.to_ascii_lowercase().contains("network") {
        ErrorCategory::Network
    } else {
        ErrorCategory::Unknown
    }
}

/// Extract the loggable message from a caught error.
pub fn error_message(err: &(dyn StdError + 'static)) -> String {
    err.to_string()
}

/// Best-effort message extraction from a panic payload.
///
/// Panics carry `&str` or `String` payloads in practice; anything else
/// yields the fixed fallback sentence.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        FALLBACK_MESSAGE.to_string()
    }
}

/// The fixed, user-safe sentence for a category.
///
/// Exhaustive over [`ErrorCategory`]; no sentence ever echoes raw failure
/// text to the end user.
pub fn friendly_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => {
            "Network error. Please check your connection and try again."
        }
        ErrorCategory::Validation => "Please check your input and try again.",
        ErrorCategory::Authentication => "Please sign in to continue.",
        ErrorCategory::Authorization => {
            "You don't have permission to perform this action."
        }
        ErrorCategory::NotFound => "The requested resource was not found.",
        ErrorCategory::ServerError => {
            "Something went wrong on our end. Please try again later."
        }
        ErrorCategory::ClientError => {
            "The request could not be completed. Please try again."
        }
        ErrorCategory::Unknown => "An unexpected error occurred. Please try again.",
    }
}

/// Whether a caught error is worth retrying.
///
/// Taxonomy values answer for themselves. For foreign errors the only
/// retryable case is a reqwest transport failure (connect or timeout) - a
/// type check, never a string match. Everything else is `false`.
pub fn is_retryable(err: &(dyn StdError + 'static)) -> bool {
    if let Some(app) = err.downcast_ref::<AppError>() {
        return app.is_retryable();
    }
    if let Some(req) = err.downcast_ref::<reqwest::Error>() {
        return req.is_connect() || req.is_timeout();
    }
    false
}
