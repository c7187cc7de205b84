//! Thin HTTP wrapper that never fails.
//!
//! Every call resolves to a [`RequestOutcome`]: either the deserialized
//! response, or a classified taxonomy error plus the fixed user-facing
//! message for its status. Failures are captured through the global logger
//! on the way out; the only UI side effect is the [`Notifier`] callback.

use crate::error::AppError;
use crate::logger::{self, Context};
use crate::logging::log_debug;
use serde::de::DeserializeOwned;
use serde_json::json;

/// Connectivity failure message, used when no response arrived at all.
const NETWORK_FAILURE_MESSAGE: &str = "Network error. Please check your connection.";

/// Receiver for user-facing failure messages (a toast or equivalent).
pub trait Notifier: Send + Sync {
    /// Show one message to the user.
    fn notify(&self, message: &str);
}

/// HTTP method for [`RequestClient::request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Result of a request: success with data, or a classified failure with its
/// user-facing message. Never a transport-level `Err`.
#[derive(Debug)]
pub struct RequestOutcome<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Deserialized response body on success. `None` for empty bodies.
    pub data: Option<T>,
    /// The classified failure, when one occurred.
    pub error: Option<AppError>,
    /// Fixed user-facing message for the failure.
    pub message: Option<String>,
}

impl<T> RequestOutcome<T> {
    fn ok(data: Option<T>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            message: None,
        }
    }

    fn failed(error: AppError, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            message: Some(message.to_string()),
        }
    }
}

/// HTTP client wrapper performing classification, capture, and notification.
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: reqwest::Client,
    base_url: String,
}

impl RequestClient {
    /// Create a client for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing reqwest client.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Perform a request and classify the result.
    ///
    /// Non-2xx statuses and transport failures are synthesized into taxonomy
    /// errors, captured through the global logger with request context, and
    /// surfaced to the user via `notify` with the fixed message for the
    /// status. This method itself never fails.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        notify: Option<&dyn Notifier>,
    ) -> RequestOutcome<T> {
        let url = self.url_for(path);
        log_debug!(method = method.as_str(), url = %url, "Performing request");

        let mut builder = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Patch => self.http.patch(&url),
            Method::Delete => self.http.delete(&url),
        };
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                let error = AppError::network(
                    format!("Request to {path} failed: {err}"),
                    None,
                );
                return self.fail(method, path, error, NETWORK_FAILURE_MESSAGE, notify);
            }
        };

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let backend_message = extract_backend_message(response).await;
            let error = error_for_status(status, path, backend_message);
            return self.fail(method, path, error, message_for_status(status), notify);
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                let error = AppError::from(err);
                return self.fail(method, path, error, NETWORK_FAILURE_MESSAGE, notify);
            }
        };
        if bytes.is_empty() {
            return RequestOutcome::ok(None);
        }
        match serde_json::from_slice(&bytes) {
            Ok(data) => RequestOutcome::ok(Some(data)),
            Err(err) => {
                let error = AppError::validation(format!(
                    "Response from {path} was not valid JSON: {err}"
                ));
                let message =
                    crate::classify::friendly_message(crate::error::ErrorCategory::Unknown);
                self.fail(method, path, error, message, notify)
            }
        }
    }

    /// GET `path`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        notify: Option<&dyn Notifier>,
    ) -> RequestOutcome<T> {
        self.request(Method::Get, path, None, notify).await
    }

    /// POST `body` to `path`.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        notify: Option<&dyn Notifier>,
    ) -> RequestOutcome<T> {
        self.request(Method::Post, path, Some(body), notify).await
    }

    /// PUT `body` to `path`.
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        notify: Option<&dyn Notifier>,
    ) -> RequestOutcome<T> {
        self.request(Method::Put, path, Some(body), notify).await
    }

    /// PATCH `body` to `path`.
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        notify: Option<&dyn Notifier>,
    ) -> RequestOutcome<T> {
        self.request(Method::Patch, path, Some(body), notify).await
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        notify: Option<&dyn Notifier>,
    ) -> RequestOutcome<T> {
        self.request(Method::Delete, path, None, notify).await
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn fail<T>(
        &self,
        method: Method,
        path: &str,
        error: AppError,
        message: &str,
        notify: Option<&dyn Notifier>,
    ) -> RequestOutcome<T> {
        let mut context = Context::new();
        context.insert("type".to_string(), json!("request_failed"));
        context.insert("method".to_string(), json!(method.as_str()));
        context.insert("path".to_string(), json!(path));
        logger::global().capture_exception(&error, context);
        if let Some(notifier) = notify {
            notifier.notify(message);
        }
        RequestOutcome::failed(error, message)
    }
}

/// Synthesize the taxonomy error for a non-success status.
fn error_for_status(status: u16, path: &str, backend_message: String) -> AppError {
    match status {
        400 => AppError::validation(or_default(backend_message, "Invalid request")),
        401 => AppError::authentication(
            or_default(backend_message, "Not authenticated"),
            "unauthenticated",
        ),
        403 => AppError::authorization(
            or_default(backend_message, "Permission denied"),
            Vec::new(),
        ),
        404 => AppError::not_found(resource_from_path(path)),
        500..=599 => AppError::server(
            or_default(backend_message, "Internal server error"),
            status,
        ),
        _ => AppError::network(
            or_default(backend_message, format!("Request failed with status {status}")),
            Some(status),
        ),
    }
}

/// Fixed status-code to user-facing-message table.
pub(crate) fn message_for_status(status: u16) -> &'static str {
    match status {
        400 => "Invalid request. Please check your input.",
        401 => "You must be logged in to perform this action.",
        403 => "You don't have permission to perform this action.",
        404 => "Resource not found.",
        409 => "A conflict occurred. The resource may have changed.",
        429 => "Too many requests. Please slow down and try again.",
        503 => "Service temporarily unavailable. Please try again later.",
        500..=599 => "Server error. Please try again later.",
        _ => "The request could not be completed. Please try again.",
    }
}

/// Pull a human message out of a failure response body, if the backend
/// provided one (`message` or `error` field, else the raw text).
async fn extract_backend_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    if text.is_empty() {
        return String::new();
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
        for key in ["message", "error"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    text
}

/// Human-readable resource type from the first path segment:
/// "/products/42" reads as "Products".
fn resource_from_path(path: &str) -> String {
    let segment = path
        .split('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("resource");
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Resource".to_string(),
    }
}

fn or_default(message: String, default: impl Into<String>) -> String {
    if message.is_empty() {
        default.into()
    } else {
        message
    }
}
