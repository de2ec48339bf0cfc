//! Diagnostic sink — where absorbed audit-log failures go
//!
//! The best-effort write API (`LogStore::must_log*`) never returns an error.
//! Each failure it swallows is handed to a `DiagnosticSink` instead, so it
//! can still be logged, counted, or alerted on.

use crate::error::Result;
use crate::types::EventType;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A log write that failed inside the best-effort API
#[derive(Debug, Clone)]
pub struct LogFailure {
    /// Entry point that failed (e.g. "must_log_tx")
    pub operation: &'static str,

    /// Alert ids the write targeted, as supplied by the caller
    pub alert_ids: Vec<String>,

    /// Event that was being recorded
    pub event: EventType,

    /// Rendered error
    pub error: String,

    /// Unix timestamp in milliseconds when the failure was absorbed
    pub failed_at: u64,
}

impl LogFailure {
    pub fn new(
        operation: &'static str,
        alert_ids: Vec<String>,
        event: EventType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            alert_ids,
            event,
            error: error.into(),
            failed_at: now_millis(),
        }
    }
}

/// Trait for diagnostic sinks
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Record one absorbed failure
    async fn handle(&self, failure: LogFailure) -> Result<()>;

    /// Number of failures currently retained
    async fn count(&self) -> Result<usize>;

    /// Most recent failures, newest first
    async fn list(&self, limit: usize) -> Result<Vec<LogFailure>>;
}

/// Sink that only emits an error-level tracing event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl DiagnosticSink for TracingSink {
    async fn handle(&self, failure: LogFailure) -> Result<()> {
        tracing::error!(
            operation = failure.operation,
            alert_ids = ?failure.alert_ids,
            event = %failure.event,
            error = %failure.error,
            "Append alert log failed"
        );
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }

    async fn list(&self, _limit: usize) -> Result<Vec<LogFailure>> {
        Ok(Vec::new())
    }
}

/// In-memory sink with bounded capacity, for tests and local inspection
pub struct MemoryDiagnosticSink {
    failures: Arc<RwLock<Vec<LogFailure>>>,
    max_failures: usize,
}

impl MemoryDiagnosticSink {
    pub fn new(max_failures: usize) -> Self {
        Self {
            failures: Arc::new(RwLock::new(Vec::new())),
            max_failures,
        }
    }
}

impl Default for MemoryDiagnosticSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DiagnosticSink for MemoryDiagnosticSink {
    async fn handle(&self, failure: LogFailure) -> Result<()> {
        tracing::warn!(
            operation = failure.operation,
            event = %failure.event,
            error = %failure.error,
            "Alert log failure absorbed"
        );

        let mut failures = self.failures.write().await;
        failures.push(failure);

        if self.max_failures > 0 && failures.len() > self.max_failures {
            let drain_count = failures.len() - self.max_failures;
            failures.drain(..drain_count);
        }

        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.failures.read().await.len())
    }

    async fn list(&self, limit: usize) -> Result<Vec<LogFailure>> {
        let failures = self.failures.read().await;
        Ok(failures.iter().rev().take(limit).cloned().collect())
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(n: usize) -> LogFailure {
        LogFailure::new("must_log", vec![format!("alert-{}", n)], EventType::Closed, format!("reason {}", n))
    }

    #[test]
    fn test_failure_creation() {
        let f = failure(1);
        assert_eq!(f.operation, "must_log");
        assert_eq!(f.error, "reason 1");
        assert!(f.failed_at > 0);
    }

    #[tokio::test]
    async fn test_memory_sink_list_newest_first() {
        let sink = MemoryDiagnosticSink::default();
        for i in 0..5 {
            sink.handle(failure(i)).await.unwrap();
        }
        assert_eq!(sink.count().await.unwrap(), 5);

        let list = sink.list(3).await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].error, "reason 4");
        assert_eq!(list[2].error, "reason 2");
    }

    #[tokio::test]
    async fn test_memory_sink_max_capacity() {
        let sink = MemoryDiagnosticSink::new(3);
        for i in 0..5 {
            sink.handle(failure(i)).await.unwrap();
        }
        assert_eq!(sink.count().await.unwrap(), 3);
        let list = sink.list(10).await.unwrap();
        assert_eq!(list[0].error, "reason 4");
        assert_eq!(list[2].error, "reason 2");
    }

    #[tokio::test]
    async fn test_tracing_sink_retains_nothing() {
        let sink = TracingSink;
        sink.handle(failure(0)).await.unwrap();
        assert_eq!(sink.count().await.unwrap(), 0);
        assert!(sink.list(10).await.unwrap().is_empty());
    }
}
