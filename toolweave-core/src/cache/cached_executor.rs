//! Caching decorator over any [`ToolExecutor`]

use super::entry::CacheOptions;
use super::key::CacheKeyContext;
use super::store::ExecutionCache;
use crate::error::Result;
use crate::metrics::{CacheEvent, MetricsRecorder};
use crate::tools::{
    ExecutionContext, META_CACHE_HIT, META_CORRELATION_ID, ToolExecutor, ToolParameters,
    ToolRegistry, ToolResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Serves repeated invocations from an [`ExecutionCache`]
///
/// Hits are marked with `cache_hit = true` metadata and reported to the
/// metrics recorder with the original execution time as time saved. Misses
/// delegate to the wrapped executor; cancelled results are never stored.
pub struct CachedToolExecutor<E> {
    inner: E,
    cache: Arc<ExecutionCache>,
    key_context: Option<CacheKeyContext>,
    skip: HashSet<String>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl<E: ToolExecutor> CachedToolExecutor<E> {
    pub fn new(inner: E, cache: Arc<ExecutionCache>) -> Self {
        Self {
            inner,
            cache,
            key_context: None,
            skip: HashSet::new(),
            metrics: None,
        }
    }

    /// Add user, environment and version dimensions to every key
    pub fn with_key_context(mut self, ctx: CacheKeyContext) -> Self {
        self.key_context = Some(ctx);
        self
    }

    /// Never cache tools whose metadata marks them uncacheable
    pub fn with_registry(mut self, registry: &ToolRegistry) -> Self {
        self.skip.extend(
            registry
                .list()
                .into_iter()
                .filter(|meta| !meta.cacheable)
                .map(|meta| meta.id),
        );
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> &Arc<ExecutionCache> {
        &self.cache
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn record(&self, event: CacheEvent) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_event(event);
        }
    }
}

#[async_trait]
impl<E: ToolExecutor> ToolExecutor for CachedToolExecutor<E> {
    async fn execute(
        &self,
        tool_id: &str,
        parameters: &ToolParameters,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult> {
        if self.skip.contains(tool_id) || !self.cache.is_cacheable(tool_id) {
            return self.inner.execute(tool_id, parameters, ctx).await;
        }

        let key = self
            .cache
            .generate_key(tool_id, parameters, self.key_context.as_ref());

        if let Some(entry) = self.cache.get(&key) {
            self.record(CacheEvent::hit(tool_id, entry.result.duration));
            let mut result = entry.result.with_metadata(META_CACHE_HIT, Value::Bool(true));
            if let Some(id) = result.metadata.get_mut(META_CORRELATION_ID) {
                *id = Value::String(ctx.correlation_id.clone());
            }
            return Ok(result);
        }
        self.record(CacheEvent::miss(tool_id));

        let result = self.inner.execute(tool_id, parameters, ctx).await?;
        if result.is_cancelled() {
            tracing::debug!(tool = %tool_id, "not caching cancelled result");
            return Ok(result);
        }

        let options = CacheOptions {
            expiration: self.cache.expiration_for(tool_id),
            ..CacheOptions::default()
        };
        self.cache.set(&key, result.clone(), options);
        Ok(result)
    }
}
