//! Execution cache configuration

use super::key::DEFAULT_MAX_KEY_LENGTH;
use crate::config::duration_map;
use crate::error::{Result, ToolweaveError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Execution cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store results at all
    pub enabled: bool,

    /// Lifetime of entries stored without an explicit expiration
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Byte budget enforced by eviction
    pub max_size_bytes: usize,

    /// How often the background task sweeps expired entries
    #[serde(with = "humantime_serde")]
    pub eviction_interval: Duration,

    /// Keys longer than this are hashed
    pub max_key_length: usize,

    /// Store failed results as well
    pub cache_failures: bool,

    /// Per-tool TTL overrides
    #[serde(with = "duration_map")]
    pub tool_ttls: HashMap<String, Duration>,

    /// Tools whose results are never cached
    pub uncacheable_tools: HashSet<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(5 * 60),
            max_size_bytes: 50 * 1024 * 1024,
            eviction_interval: Duration::from_secs(60),
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            cache_failures: false,
            tool_ttls: HashMap::new(),
            uncacheable_tools: HashSet::new(),
        }
    }
}

impl CacheConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    pub fn with_eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }

    pub fn with_tool_ttl(mut self, tool_id: impl Into<String>, ttl: Duration) -> Self {
        self.tool_ttls.insert(tool_id.into(), ttl);
        self
    }

    pub fn with_uncacheable(mut self, tool_id: impl Into<String>) -> Self {
        self.uncacheable_tools.insert(tool_id.into());
        self
    }

    pub fn with_cache_failures(mut self, enabled: bool) -> Self {
        self.cache_failures = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(ToolweaveError::Configuration(
                "cache.max_size_bytes must be greater than zero".into(),
            ));
        }
        if self.eviction_interval.is_zero() {
            return Err(ToolweaveError::Configuration(
                "cache.eviction_interval must be greater than zero".into(),
            ));
        }
        // Room for at least the `tool:<id>:hash:<digest>` form
        if self.max_key_length < 80 {
            return Err(ToolweaveError::Configuration(
                "cache.max_key_length must be at least 80".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.max_size_bytes, 52_428_800);
        assert!(!config.cache_failures);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let config = CacheConfig::default().with_max_size_bytes(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_round_trip() {
        let config = CacheConfig::default().with_tool_ttl("web_fetch", Duration::from_secs(30));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["default_ttl"], "5m");
        assert_eq!(json["tool_ttls"]["web_fetch"], "30s");

        let back: CacheConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
