//! Configuration types for toolweave

use crate::cache::CacheConfig;
use crate::error::{Result, ToolweaveError};
use crate::limiter::LimiterConfig;
use crate::tools::ToolRuntimeConfig;
use crate::workflow::EngineConfig;
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Main configuration for toolweave
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolweaveConfig {
    /// Execution cache configuration
    pub cache: CacheConfig,

    /// Output limiter thresholds
    pub limiter: LimiterConfig,

    /// Chain engine retry and progress settings
    pub engine: EngineConfig,

    /// Reference tool runtime settings
    pub runtime: ToolRuntimeConfig,
}

impl ToolweaveConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order, later sources overriding earlier ones:
    /// 1. Default configuration
    /// 2. `toolweave.toml` in the working directory
    /// 3. The file named by `TOOLWEAVE_CONFIG_PATH`
    /// 4. `TOOLWEAVE_` environment variables, nested with `__`
    ///    (`TOOLWEAVE_CACHE__DEFAULT_TTL=10m`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or a value fails
    /// validation.
    pub fn load() -> Result<Self> {
        use figment::providers::{Env, Format, Toml};

        let mut figment = Self::defaults().merge(Toml::file("toolweave.toml"));

        if let Ok(path) = std::env::var("TOOLWEAVE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("TOOLWEAVE_")
                .ignore(&["CONFIG_PATH"])
                .split("__"),
        );

        Self::extract(figment)
            .map_err(|e| ToolweaveError::Configuration(format!("Failed to load configuration: {}", e)))
    }

    /// Load configuration from a specific TOML file.
    ///
    /// Keys missing from the file keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::providers::{Format, Toml};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolweaveError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        Self::extract(Self::defaults().merge(Toml::file(path))).map_err(|e| {
            ToolweaveError::Configuration(format!("Failed to load configuration file: {}", e))
        })
    }

    /// Extract and validate a configuration from any figment
    pub fn extract(figment: Figment) -> Result<Self> {
        let config: ToolweaveConfig = figment
            .extract()
            .map_err(|e| ToolweaveError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Figment {
        use figment::providers::Serialized;
        Figment::from(Serialized::defaults(ToolweaveConfig::default()))
    }

    /// Check every section for values the components cannot work with
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.limiter.validate()?;
        self.engine.validate()?;
        if self.runtime.default_timeout.is_zero() {
            return Err(ToolweaveError::Configuration(
                "runtime.default_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Serde helpers for `HashMap<String, Duration>` with humantime values
pub(crate) mod duration_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    pub fn serialize<S>(map: &HashMap<String, Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sorted: BTreeMap<&String, humantime_serde::Serde<Duration>> = map
            .iter()
            .map(|(k, v)| (k, humantime_serde::Serde::from(*v)))
            .collect();
        sorted.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, humantime_serde::Serde<Duration>>::deserialize(deserializer)?;
        Ok(raw.into_iter().map(|(k, v)| (k, v.into_inner())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_are_valid() {
        let config = ToolweaveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
        assert_eq!(config.limiter.max_text_chars, 10_000);
        assert_eq!(config.engine.progress_buffer, 64);
        assert_eq!(config.runtime.default_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_extract_merges_over_defaults() {
        use figment::providers::Serialized;

        let figment = ToolweaveConfig::defaults()
            .merge(Serialized::default("cache.default_ttl", "10m"))
            .merge(Serialized::default("limiter.log_head_lines", 20));
        let config = ToolweaveConfig::extract(figment).unwrap();

        assert_eq!(config.cache.default_ttl, Duration::from_secs(600));
        assert_eq!(config.limiter.log_head_lines, 20);
        assert_eq!(config.limiter.log_tail_lines, 50);
    }

    #[test]
    fn test_invalid_section_rejected() {
        let mut config = ToolweaveConfig::default();
        config.limiter.log_tail_lines = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("limiter.log_tail_lines"));
    }
}
