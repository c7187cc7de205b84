//! External error reporting sink.
//!
//! In production the logger forwards each capture to a sink, fire-and-forget.
//! Sink failures are swallowed with a local warning - reporting must never
//! become a second failure the user sees.

use crate::error::{AppError, AppResult, ErrorCategory, ErrorSeverity};
use crate::logger::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payload forwarded for a single captured error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    /// Raw (internal) failure message.
    pub message: String,
    /// Captured backtrace, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Capture time, epoch milliseconds.
    pub timestamp: i64,
    /// Host-app location at capture time.
    pub url: String,
    /// Reporting application identifier.
    pub user_agent: String,
    /// Ad-hoc context attached at the capture site.
    #[serde(default)]
    pub context: Context,
    /// Taxonomy category.
    pub category: ErrorCategory,
    /// Resolved severity.
    pub severity: ErrorSeverity,
    /// Stable per-process session id.
    pub session_id: String,
    /// Breadcrumb trail snapshot, oldest first.
    pub breadcrumbs: Vec<String>,
}

/// Destination for forwarded error payloads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver one payload.
    async fn submit(&self, payload: ReportPayload) -> AppResult<()>;
}

/// Sink that POSTs payloads to a configured HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpReportSink {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpReportSink {
    /// Create a sink targeting `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// The endpoint this sink delivers to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReportSink for HttpReportSink {
    async fn submit(&self, payload: ReportPayload) -> AppResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::network(
                format!("Report sink rejected payload: {status}"),
                Some(status.as_u16()),
            ));
        }
        Ok(())
    }
}
