// Shared test doubles for the guardrail unit tests.
//
// The logger is built with explicit backends here so unit tests never touch
// the process-wide singleton or the filesystem.

use crate::config::{Environment, LoggerConfig};
use crate::error::{AppError, AppResult};
use crate::logger::{ErrorLogger, LoggedError};
use crate::report::{ReportPayload, ReportSink};
use crate::storage::{LogStore, MemoryLogStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Logger writing to an in-memory store, no sink.
pub fn memory_logger() -> ErrorLogger {
    ErrorLogger::with_backends(
        LoggerConfig::default(),
        Box::new(MemoryLogStore::new()),
        None,
    )
}

/// Production-mode logger forwarding to the given sink.
pub fn forwarding_logger(sink: Arc<dyn ReportSink>) -> ErrorLogger {
    let config = LoggerConfig {
        environment: Environment::Production,
        ..LoggerConfig::default()
    };
    ErrorLogger::with_backends(config, Box::new(MemoryLogStore::new()), Some(sink))
}

/// Sink that hands every submitted payload to a channel, so tests can await
/// the fire-and-forget forwarding without sleeping.
pub struct RecordingSink {
    tx: mpsc::UnboundedSender<ReportPayload>,
}

impl RecordingSink {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ReportPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn submit(&self, payload: ReportPayload) -> AppResult<()> {
        self.tx
            .send(payload)
            .map_err(|_| AppError::unexpected("recording sink receiver dropped"))
    }
}

/// Store delegating to a shared [`MemoryLogStore`] so tests can observe
/// what the logger persisted.
pub struct SharedStore(pub Arc<MemoryLogStore>);

impl LogStore for SharedStore {
    fn load(&self) -> AppResult<Vec<LoggedError>> {
        self.0.load()
    }

    fn save(&self, errors: &[LoggedError]) -> AppResult<()> {
        self.0.save(errors)
    }

    fn clear(&self) -> AppResult<()> {
        self.0.clear()
    }
}
