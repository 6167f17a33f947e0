//! In-memory metrics recorder with aggregate and trend queries

use super::recorder::{CacheEvent, ExecutionRecord, MetricsRecorder};
use crate::error::Result;
use crate::tools::duration_millis;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

/// Aggregate over recorded executions and cache events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolAggregate {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
    #[serde(with = "duration_millis")]
    pub average_duration: Duration,
    #[serde(with = "duration_millis")]
    pub max_duration: Duration,
    pub cache_hits: u64,
    pub cache_misses: u64,
    #[serde(with = "duration_millis")]
    pub time_saved: Duration,
}

impl ToolAggregate {
    pub fn success_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.successes as f64 / self.executions as f64
        }
    }
}

/// Executions falling into one time bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub bucket_start: DateTime<Utc>,
    pub executions: u64,
    pub success_rate: f64,
    #[serde(with = "duration_millis")]
    pub average_duration: Duration,
}

#[derive(Debug, Default, Serialize)]
struct RecorderState {
    executions: Vec<ExecutionRecord>,
    cache_events: Vec<CacheEvent>,
}

/// Recorder that keeps everything in memory until [`cleanup`](Self::cleanup)
#[derive(Debug, Default)]
pub struct InMemoryMetricsRecorder {
    state: RwLock<RecorderState>,
}

impl InMemoryMetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate for one tool, or across all tools when `tool_id` is `None`
    pub fn aggregate(&self, tool_id: Option<&str>) -> ToolAggregate {
        let Ok(state) = self.state.read() else {
            return ToolAggregate::default();
        };
        let matches = |id: &str| tool_id.is_none_or(|wanted| wanted == id);

        let mut aggregate = ToolAggregate::default();
        let mut total = Duration::ZERO;
        for record in state.executions.iter().filter(|r| matches(&r.tool_id)) {
            aggregate.executions += 1;
            if record.success {
                aggregate.successes += 1;
            } else {
                aggregate.failures += 1;
            }
            total += record.duration;
            aggregate.max_duration = aggregate.max_duration.max(record.duration);
        }
        if aggregate.executions > 0 {
            aggregate.average_duration = total / aggregate.executions as u32;
        }

        for event in state.cache_events.iter().filter(|e| matches(&e.tool_id)) {
            if event.hit {
                aggregate.cache_hits += 1;
                aggregate.time_saved += event.time_saved;
            } else {
                aggregate.cache_misses += 1;
            }
        }

        aggregate
    }

    /// Execution trend in fixed-width time buckets, oldest first
    pub fn trend(&self, tool_id: Option<&str>, bucket: Duration) -> Vec<TrendPoint> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let bucket_ms = (bucket.as_millis() as i64).max(1);

        let mut buckets: BTreeMap<i64, (u64, u64, Duration)> = BTreeMap::new();
        for record in state
            .executions
            .iter()
            .filter(|r| tool_id.is_none_or(|wanted| wanted == r.tool_id))
        {
            let slot = record.timestamp.timestamp_millis().div_euclid(bucket_ms);
            let entry = buckets.entry(slot).or_insert((0, 0, Duration::ZERO));
            entry.0 += 1;
            if record.success {
                entry.1 += 1;
            }
            entry.2 += record.duration;
        }

        buckets
            .into_iter()
            .filter_map(|(slot, (count, successes, total))| {
                let bucket_start = Utc.timestamp_millis_opt(slot * bucket_ms).single()?;
                Some(TrendPoint {
                    bucket_start,
                    executions: count,
                    success_rate: successes as f64 / count as f64,
                    average_duration: total / count as u32,
                })
            })
            .collect()
    }

    /// Serialize every retained record as JSON
    pub fn export_json(&self) -> Result<String> {
        let state = self
            .state
            .read()
            .map_err(|_| crate::error::ToolweaveError::Other("metrics lock poisoned".into()))?;
        Ok(serde_json::to_string_pretty(&*state)?)
    }

    /// Drop records older than `retention`, returning how many were removed
    pub fn cleanup(&self, retention: Duration) -> usize {
        let Ok(mut state) = self.state.write() else {
            return 0;
        };
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = Utc::now() - retention;

        let before = state.executions.len() + state.cache_events.len();
        state.executions.retain(|r| r.timestamp >= cutoff);
        state.cache_events.retain(|e| e.timestamp >= cutoff);
        before - (state.executions.len() + state.cache_events.len())
    }
}

impl MetricsRecorder for InMemoryMetricsRecorder {
    fn record_execution(&self, record: ExecutionRecord) {
        if let Ok(mut state) = self.state.write() {
            state.executions.push(record);
        }
    }

    fn record_cache_event(&self, event: CacheEvent) {
        if let Ok(mut state) = self.state.write() {
            state.cache_events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_per_tool() {
        let recorder = InMemoryMetricsRecorder::new();
        recorder.record_execution(ExecutionRecord::new("grep", Duration::from_millis(10), true));
        recorder.record_execution(ExecutionRecord::new("grep", Duration::from_millis(30), false));
        recorder.record_execution(ExecutionRecord::new("ls", Duration::from_millis(5), true));
        recorder.record_cache_event(CacheEvent::hit("grep", Duration::from_millis(10)));
        recorder.record_cache_event(CacheEvent::miss("grep"));

        let grep = recorder.aggregate(Some("grep"));
        assert_eq!(grep.executions, 2);
        assert_eq!(grep.failures, 1);
        assert_eq!(grep.average_duration, Duration::from_millis(20));
        assert_eq!(grep.max_duration, Duration::from_millis(30));
        assert_eq!(grep.cache_hits, 1);
        assert_eq!(grep.cache_misses, 1);
        assert_eq!(grep.time_saved, Duration::from_millis(10));
        assert!((grep.success_rate() - 0.5).abs() < f64::EPSILON);

        assert_eq!(recorder.aggregate(None).executions, 3);
    }

    #[test]
    fn test_trend_buckets() {
        let recorder = InMemoryMetricsRecorder::new();
        for _ in 0..3 {
            recorder.record_execution(ExecutionRecord::new("ls", Duration::from_millis(4), true));
        }

        let trend = recorder.trend(Some("ls"), Duration::from_secs(3600));
        let total: u64 = trend.iter().map(|p| p.executions).sum();
        assert_eq!(total, 3);
        assert!(trend.iter().all(|p| p.success_rate == 1.0));
    }

    #[test]
    fn test_cleanup_and_export() {
        let recorder = InMemoryMetricsRecorder::new();
        let mut old = ExecutionRecord::new("ls", Duration::from_millis(1), true);
        old.timestamp = Utc::now() - chrono::Duration::days(2);
        recorder.record_execution(old);
        recorder.record_execution(ExecutionRecord::new("ls", Duration::from_millis(1), true));

        assert_eq!(recorder.cleanup(Duration::from_secs(24 * 3600)), 1);
        assert_eq!(recorder.aggregate(None).executions, 1);

        let exported = recorder.export_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed["executions"].as_array().unwrap().len(), 1);
    }
}
