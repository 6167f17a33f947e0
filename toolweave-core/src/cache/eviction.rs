//! Background eviction task

use super::store::ExecutionCache;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Owns the background eviction task
///
/// The task stops on [`shutdown`](Self::shutdown), when the handle is
/// dropped, or once the cache itself has been dropped.
#[derive(Debug)]
pub struct EvictionHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EvictionHandle {
    /// Stop the task and wait for it to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "cache eviction task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for EvictionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ExecutionCache {
    /// Start sweeping expired entries every `eviction_interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_eviction(self: &Arc<Self>) -> EvictionHandle {
        let cancel = CancellationToken::new();
        let period = self.config().eviction_interval.max(Duration::from_millis(1));
        let cache = Arc::downgrade(self);
        let task = tokio::spawn(eviction_loop(cache, period, cancel.clone()));

        EvictionHandle {
            cancel,
            task: Some(task),
        }
    }
}

async fn eviction_loop(cache: Weak<ExecutionCache>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let evicted = cache.run_maintenance();
                if evicted > 0 {
                    tracing::debug!(evicted, "background cache eviction");
                }
            }
        }
    }

    tracing::trace!("cache eviction task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheOptions};
    use crate::tools::ToolResult;

    #[tokio::test]
    async fn test_background_sweep_removes_expired() {
        let cache = Arc::new(ExecutionCache::new(
            CacheConfig::default().with_eviction_interval(Duration::from_millis(10)),
        ));
        cache.set(
            "tool:a:params:",
            ToolResult::success("a", serde_json::json!(1)),
            CacheOptions::new().with_ttl(Duration::from_millis(1)),
        );

        let handle = cache.spawn_eviction();
        assert!(handle.is_running());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.is_empty());
        assert_eq!(cache.statistics().evictions, 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_task_stops_when_cache_dropped() {
        let cache = Arc::new(ExecutionCache::new(
            CacheConfig::default().with_eviction_interval(Duration::from_millis(5)),
        ));
        let handle = cache.spawn_eviction();
        drop(cache);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!handle.is_running());
    }
}
