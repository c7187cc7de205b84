//! Configuration for the error logger and report forwarding.
//!
//! Follows the same shape as the rest of the crate's configuration story:
//! a struct with documented defaults, a `from_env` reader, and an explicit
//! `validate` step that returns a typed error instead of panicking.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Build environment the framework runs under.
///
/// Development emits captures to the diagnostic channel; production forwards
/// them to the configured report sink instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development. Captures are echoed via tracing, never forwarded.
    #[default]
    Development,
    /// Production. Captures are forwarded to the report sink when one is
    /// configured.
    Production,
}

impl Environment {
    /// Read the environment from `GUARDRAIL_ENV`.
    ///
    /// Accepts `production`/`prod`; anything else (including unset) is
    /// development, so a misconfigured deploy fails safe and loud locally
    /// rather than silently forwarding.
    pub fn from_env() -> Self {
        match env::var("GUARDRAIL_ENV").ok().as_deref() {
            Some("production") | Some("prod") => Self::Production,
            _ => Self::Development,
        }
    }

    /// Whether this is the production environment.
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Configuration for [`crate::ErrorLogger`].
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Build environment; decides echo-vs-forward behavior on capture.
    pub environment: Environment,
    /// Endpoint the report sink POSTs payloads to. `None` disables
    /// forwarding entirely, even in production.
    pub report_endpoint: Option<String>,
    /// Where the persisted error buffer lives.
    pub log_path: PathBuf,
    /// Identifier attached to every capture's metadata.
    pub user_agent: String,
    /// Initial "current location" (route/screen) for capture metadata;
    /// updated at runtime via [`crate::ErrorLogger::set_location`].
    pub location: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            report_endpoint: None,
            log_path: default_log_path(),
            user_agent: default_user_agent(),
            location: "/".to_string(),
        }
    }
}

impl LoggerConfig {
    /// Build a configuration from environment variables.
    ///
    /// Reads `GUARDRAIL_ENV`, `GUARDRAIL_REPORT_ENDPOINT`, and
    /// `GUARDRAIL_LOG_PATH`, then validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if:
    /// - The report endpoint is set but is not an http(s) URL
    /// - The log path is empty
    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            environment: Environment::from_env(),
            report_endpoint: env::var("GUARDRAIL_REPORT_ENDPOINT")
                .ok()
                .filter(|value| !value.is_empty()),
            log_path: env::var("GUARDRAIL_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_log_path()),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a non-http(s) report endpoint or
    /// an empty log path.
    pub fn validate(&self) -> AppResult<()> {
        if let Some(endpoint) = &self.report_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(AppError::validation(format!(
                    "Report endpoint must be an http(s) URL, got: {endpoint}"
                )));
            }
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(AppError::validation("Log path must not be empty"));
        }
        Ok(())
    }
}

/// Default identifier attached to capture metadata: crate name, version,
/// and host OS.
pub(crate) fn default_user_agent() -> String {
    format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// Default location of the persisted error buffer.
///
/// Lives under the system temp directory: the buffer is diagnostic state,
/// not user data, and must never fail capture over an unwritable work dir.
pub(crate) fn default_log_path() -> PathBuf {
    env::temp_dir().join("guardrail-errors.json")
}
