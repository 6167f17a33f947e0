//! Metrics recorder contract

use crate::tools::duration_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_id: String,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub success: bool,
    pub correlation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(tool_id: impl Into<String>, duration: Duration, success: bool) -> Self {
        Self {
            tool_id: tool_id.into(),
            duration,
            success,
            correlation_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// A cache lookup outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEvent {
    pub tool_id: String,
    pub hit: bool,
    /// Execution time avoided by serving the cached result
    #[serde(with = "duration_millis")]
    pub time_saved: Duration,
    pub timestamp: DateTime<Utc>,
}

impl CacheEvent {
    pub fn hit(tool_id: impl Into<String>, time_saved: Duration) -> Self {
        Self {
            tool_id: tool_id.into(),
            hit: true,
            time_saved,
            timestamp: Utc::now(),
        }
    }

    pub fn miss(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            hit: false,
            time_saved: Duration::ZERO,
            timestamp: Utc::now(),
        }
    }
}

/// Fire-and-forget sink for execution and cache records
///
/// Callers never branch on anything a recorder does; implementations must not
/// block for long and must swallow their own failures.
pub trait MetricsRecorder: Send + Sync {
    fn record_execution(&self, record: ExecutionRecord);

    fn record_cache_event(&self, event: CacheEvent);
}

/// Recorder that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsRecorder;

impl MetricsRecorder for NoopMetricsRecorder {
    fn record_execution(&self, _record: ExecutionRecord) {}

    fn record_cache_event(&self, _event: CacheEvent) {}
}
