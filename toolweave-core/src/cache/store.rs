//! The shared execution cache store
//!
//! Uses interior mutability with a `RwLock` so every operation takes `&self`
//! and one `Arc<ExecutionCache>` can be shared by any number of chain runs and
//! direct tool invocations. A reverse index maps each dependency key to the
//! entries derived from it, which is what makes invalidation transitive.
//!
//! The cache must never be the reason a tool call fails: a poisoned lock is
//! logged and treated as a miss (reads) or a no-op (writes).

use super::config::CacheConfig;
use super::entry::{CacheEntry, CacheOptions, CachePriority, Expiration};
use super::key::{CacheKeyContext, KeyGenerator, tool_id_from_key};
use crate::tools::{ToolParameters, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{RwLock, RwLockWriteGuard};

/// Point-in-time cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_size_bytes: usize,
    pub max_size_bytes: usize,
    /// Entry count per tool id
    pub per_tool: BTreeMap<String, usize>,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// dependency key -> keys of entries that declared it
    dependents: HashMap<String, HashSet<String>>,
    total_size: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn insert(&mut self, entry: CacheEntry) {
        self.remove(&entry.key);
        for dependency in &entry.dependencies {
            self.dependents
                .entry(dependency.clone())
                .or_default()
                .insert(entry.key.clone());
        }
        self.total_size += entry.size_bytes;
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Remove one entry, leaving entries derived from it in place
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_size = self.total_size.saturating_sub(entry.size_bytes);
        for dependency in &entry.dependencies {
            if let Some(set) = self.dependents.get_mut(dependency) {
                set.remove(key);
                if set.is_empty() {
                    self.dependents.remove(dependency);
                }
            }
        }
        Some(entry)
    }

    /// Remove `key` and, transitively, everything derived from it
    fn remove_cascading(&mut self, key: &str) -> usize {
        let mut removed = 0;
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([key.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if self.remove(&current).is_some() {
                removed += 1;
            }
            if let Some(derived) = self.dependents.remove(&current) {
                queue.extend(derived);
            }
        }
        removed
    }

    fn evict_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|e| e.is_expired_at(now))
            .map(|e| e.key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        self.evictions += expired.len() as u64;
        expired.len()
    }

    /// Evict lowest priority, then least recently accessed, until under budget
    fn enforce_budget(&mut self, max_size: usize) -> usize {
        if self.total_size <= max_size {
            return 0;
        }

        let mut candidates: Vec<(CachePriority, DateTime<Utc>, String)> = self
            .entries
            .values()
            .map(|e| (e.priority, e.last_accessed, e.key.clone()))
            .collect();
        candidates.sort();

        let mut evicted = 0;
        for (_, _, key) in candidates {
            if self.total_size <= max_size {
                break;
            }
            if self.remove(&key).is_some() {
                evicted += 1;
            }
        }
        self.evictions += evicted as u64;
        evicted
    }
}

/// Memoized tool results behind canonical keys
pub struct ExecutionCache {
    inner: RwLock<CacheInner>,
    config: CacheConfig,
    keys: KeyGenerator,
}

impl ExecutionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            keys: KeyGenerator::new(config.max_key_length),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn write(&self) -> Option<RwLockWriteGuard<'_, CacheInner>> {
        match self.inner.write() {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::warn!("execution cache lock poisoned, treating as miss");
                None
            }
        }
    }

    /// Canonical key for a tool invocation
    pub fn generate_key(
        &self,
        tool_id: &str,
        parameters: &ToolParameters,
        ctx: Option<&CacheKeyContext>,
    ) -> String {
        self.keys.generate(tool_id, parameters, ctx)
    }

    /// Whether results of `tool_id` may be cached at all
    pub fn is_cacheable(&self, tool_id: &str) -> bool {
        self.config.enabled && !self.config.uncacheable_tools.contains(tool_id)
    }

    /// Expiration to use for `tool_id` when the caller has no preference
    pub fn expiration_for(&self, tool_id: &str) -> Expiration {
        self.config
            .tool_ttls
            .get(tool_id)
            .map_or(Expiration::Default, |ttl| Expiration::Ttl(*ttl))
    }

    /// Look up a live entry, counting the hit and sliding its expiry
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut inner = self.write()?;
        let now = Utc::now();

        match inner.entries.get(key).map(|e| e.is_expired_at(now)) {
            None => {
                inner.misses += 1;
                tracing::trace!(key, "cache miss");
                return None;
            }
            Some(true) => {
                inner.remove(key);
                inner.evictions += 1;
                inner.misses += 1;
                tracing::debug!(key, "cache entry expired");
                return None;
            }
            Some(false) => {}
        }

        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.touch(now);
        tracing::debug!(key, hits = entry.hit_count, "cache hit");
        Some(entry.clone())
    }

    /// Store a result; returns whether it is now cached
    ///
    /// Failed results are skipped unless failure caching is enabled in the
    /// options or, failing that, the configuration.
    pub fn set(&self, key: &str, result: ToolResult, options: CacheOptions) -> bool {
        if !self.config.enabled {
            return false;
        }
        let cache_failures = options.cache_failures.unwrap_or(self.config.cache_failures);
        if !result.success && !cache_failures {
            return false;
        }

        let tool_id = tool_id_from_key(key)
            .map(str::to_string)
            .unwrap_or_else(|| result.tool_id.clone());
        let entry = CacheEntry::new(
            key.to_string(),
            tool_id,
            result,
            options,
            self.config.default_ttl,
        );
        if entry.size_bytes > self.config.max_size_bytes {
            tracing::debug!(key, size = entry.size_bytes, "result larger than cache budget");
            if let Some(mut inner) = self.write() {
                inner.remove_cascading(key);
            }
            return false;
        }

        let Some(mut inner) = self.write() else {
            return false;
        };
        inner.insert(entry);
        let evicted = inner.enforce_budget(self.config.max_size_bytes);
        if evicted > 0 {
            tracing::debug!(evicted, "evicted entries to stay within budget");
        }
        inner.entries.contains_key(key)
    }

    /// Remove `key` and every entry that depends on it, transitively
    pub fn invalidate(&self, key: &str) -> usize {
        let Some(mut inner) = self.write() else {
            return 0;
        };
        let removed = inner.remove_cascading(key);
        tracing::debug!(key, removed, "invalidated");
        removed
    }

    /// Remove every entry whose key matches a glob pattern
    ///
    /// An invalid pattern removes nothing.
    pub fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let matcher = match glob::Pattern::new(pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "invalid invalidation pattern");
                return 0;
            }
        };

        let Some(mut inner) = self.write() else {
            return 0;
        };
        let matching: Vec<String> = inner
            .entries
            .keys()
            .filter(|key| matcher.matches(key))
            .cloned()
            .collect();

        let removed: usize = matching
            .iter()
            .map(|key| inner.remove_cascading(key))
            .sum();
        tracing::debug!(pattern, removed, "invalidated by pattern");
        removed
    }

    /// Remove every entry produced by `tool_id`
    pub fn invalidate_by_tool(&self, tool_id: &str) -> usize {
        self.invalidate_by_pattern(&format!("tool:{}:*", glob::Pattern::escape(tool_id)))
    }

    /// Remove every entry; cumulative counters are kept
    pub fn clear(&self) {
        if let Some(mut inner) = self.write() {
            inner.entries.clear();
            inner.dependents.clear();
            inner.total_size = 0;
        }
    }

    pub fn statistics(&self) -> CacheStatistics {
        let Ok(inner) = self.inner.read() else {
            return CacheStatistics::default();
        };

        let mut per_tool: BTreeMap<String, usize> = BTreeMap::new();
        for entry in inner.entries.values() {
            *per_tool.entry(entry.tool_id.clone()).or_insert(0) += 1;
        }

        CacheStatistics {
            entry_count: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            total_size_bytes: inner.total_size,
            max_size_bytes: self.config.max_size_bytes,
            per_tool,
        }
    }

    /// Remove expired entries, returning how many were evicted
    pub fn evict_expired(&self) -> usize {
        self.write().map_or(0, |mut inner| inner.evict_expired())
    }

    /// One sweep of the background eviction: expired entries, then the budget
    pub fn run_maintenance(&self) -> usize {
        let Some(mut inner) = self.write() else {
            return 0;
        };
        inner.evict_expired() + inner.enforce_budget(self.config.max_size_bytes)
    }

    pub fn len(&self) -> usize {
        self.inner.read().map_or(0, |inner| inner.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExecutionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for ExecutionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionCache")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}
