//! Cache entries and storage options

use crate::tools::ToolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// How an entry expires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    /// Use the cache's default TTL
    #[default]
    Default,
    /// Fixed lifetime from insertion
    Ttl(#[serde(with = "humantime_serde")] Duration),
    /// Expires at a fixed instant
    Absolute(DateTime<Utc>),
    /// Expires after this long without being read
    Sliding(#[serde(with = "humantime_serde")] Duration),
}

/// Eviction priority; lower priorities go first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Options for storing one result
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    pub expiration: Expiration,
    pub priority: CachePriority,
    /// Keys this entry is derived from; invalidating any of them removes it
    pub dependencies: HashSet<String>,
    /// Store failed results too (`None` defers to the cache configuration)
    pub cache_failures: Option<bool>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expiration = Expiration::Ttl(ttl);
        self
    }

    pub fn with_sliding(mut self, window: Duration) -> Self {
        self.expiration = Expiration::Sliding(window);
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expiration = Expiration::Absolute(at);
        self
    }

    pub fn with_priority(mut self, priority: CachePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, key: impl Into<String>) -> Self {
        self.dependencies.insert(key.into());
        self
    }

    pub fn cache_failures(mut self, enabled: bool) -> Self {
        self.cache_failures = Some(enabled);
        self
    }
}

/// A memoized tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub tool_id: String,
    pub result: ToolResult,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Window re-applied on every hit, for sliding entries
    #[serde(default, with = "humantime_serde")]
    pub sliding: Option<Duration>,
    pub dependencies: HashSet<String>,
    pub hit_count: u64,
    pub size_bytes: usize,
    pub priority: CachePriority,
}

impl CacheEntry {
    pub(crate) fn new(
        key: String,
        tool_id: String,
        result: ToolResult,
        options: CacheOptions,
        default_ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        let (expires_at, sliding) = match options.expiration {
            Expiration::Default => (after(now, default_ttl), None),
            Expiration::Ttl(ttl) => (after(now, ttl), None),
            Expiration::Absolute(at) => (at, None),
            Expiration::Sliding(window) => (after(now, window), Some(window)),
        };
        let size_bytes = key.len() + result.estimated_size();

        Self {
            key,
            tool_id,
            result,
            created_at: now,
            last_accessed: now,
            expires_at,
            sliding,
            dependencies: options.dependencies,
            hit_count: 0,
            size_bytes,
            priority: options.priority,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub(crate) fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Record a hit, sliding the expiry forward when configured
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.hit_count += 1;
        self.last_accessed = now;
        if let Some(window) = self.sliding {
            self.expires_at = after(now, window);
        }
    }
}

/// `now + duration`, saturating at the latest representable instant
fn after(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(options: CacheOptions) -> CacheEntry {
        CacheEntry::new(
            "tool:t:params:".to_string(),
            "t".to_string(),
            ToolResult::success("t", serde_json::json!(1)),
            options,
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_default_ttl_applied() {
        let e = entry(CacheOptions::new());
        assert!(!e.is_expired());
        assert!(e.expires_at > e.created_at + chrono::Duration::seconds(59));
        assert!(e.sliding.is_none());
    }

    #[test]
    fn test_absolute_expiry() {
        let past = Utc::now() - chrono::Duration::seconds(1);
        assert!(entry(CacheOptions::new().expires_at(past)).is_expired());
    }

    #[test]
    fn test_touch_slides_expiry() {
        let mut e = entry(CacheOptions::new().with_sliding(Duration::from_secs(10)));
        let before = e.expires_at;
        e.touch(Utc::now() + chrono::Duration::seconds(5));
        assert!(e.expires_at > before);
        assert_eq!(e.hit_count, 1);
    }

    #[test]
    fn test_priority_order() {
        assert!(CachePriority::Low < CachePriority::Normal);
        assert!(CachePriority::Normal < CachePriority::High);
    }
}
