//! Execution and cache metrics
//!
//! Recording is fire-and-forget: nothing in the execution path depends on a
//! recorder succeeding. [`InMemoryMetricsRecorder`] keeps records for
//! aggregate and trend queries until they are cleaned up.

pub mod recorder;
pub mod storage;

pub use recorder::{CacheEvent, ExecutionRecord, MetricsRecorder, NoopMetricsRecorder};
pub use storage::{InMemoryMetricsRecorder, ToolAggregate, TrendPoint};
