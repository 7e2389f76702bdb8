//! Configuration for the cache engine
//!
//! Loaded from a TOML file with environment-variable overrides for
//! deployment-specific values, then validated up front so a bad config is a
//! startup failure rather than a silent runtime degradation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Configuration for `StreamCacheEngine` and its warm-tier adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Key namespace prepended to every warm-tier key (`<namespace>:<key>`)
    pub namespace: String,

    /// Redis-compatible connection URL for the warm tier
    pub warm_url: String,

    /// Hot-tier entry time-to-live in milliseconds
    pub hot_cache_ttl_ms: u64,

    /// Warm-tier time-to-live in whole seconds (the warm store's native unit)
    pub warm_cache_ttl_secs: u64,

    /// Maximum number of hot-tier entries before LRU eviction kicks in
    pub max_hot_cache_size: usize,

    /// Interval for the background TTL sweep in milliseconds
    pub cleanup_interval_ms: u64,

    /// `CachePriority::Auto` threshold: payloads with at most this many
    /// points are written to both tiers, larger payloads go warm-only
    pub auto_placement_max_points: usize,

    /// Per-call timeout for warm-tier network operations in milliseconds
    pub warm_op_timeout_ms: u64,

    /// Concurrency bound for `get_batch_data` fan-out
    pub batch_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "stream_cache".to_string(),
            warm_url: "redis://127.0.0.1:6379".to_string(),
            hot_cache_ttl_ms: 30_000,
            warm_cache_ttl_secs: 300,
            max_hot_cache_size: 10_000,
            cleanup_interval_ms: 5_000,
            auto_placement_max_points: 100,
            warm_op_timeout_ms: 200,
            batch_concurrency: 16,
        }
    }
}

impl CacheConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CacheError::Configuration(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let mut config: CacheConfig = toml::from_str(&contents)
            .map_err(|e| CacheError::Configuration(format!("invalid config file: {}", e)))?;

        // Environment overrides for deployment-specific values
        if let Ok(url) = std::env::var("TICKCACHE_WARM_URL") {
            config.warm_url = url;
        }
        if let Ok(ns) = std::env::var("TICKCACHE_NAMESPACE") {
            config.namespace = ns;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate all invariants that would otherwise surface as confusing
    /// runtime behavior
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(CacheError::Configuration(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.namespace.contains(':') {
            return Err(CacheError::Configuration(
                "namespace must not contain ':'".to_string(),
            ));
        }
        if self.hot_cache_ttl_ms == 0 {
            return Err(CacheError::Configuration(
                "hot_cache_ttl_ms must be > 0".to_string(),
            ));
        }
        if self.warm_cache_ttl_secs == 0 {
            return Err(CacheError::Configuration(
                "warm_cache_ttl_secs must be > 0".to_string(),
            ));
        }
        if self.max_hot_cache_size == 0 {
            return Err(CacheError::Configuration(
                "max_hot_cache_size must be > 0".to_string(),
            ));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(CacheError::Configuration(
                "cleanup_interval_ms must be > 0".to_string(),
            ));
        }
        if self.auto_placement_max_points == 0 {
            return Err(CacheError::Configuration(
                "auto_placement_max_points must be > 0".to_string(),
            ));
        }
        if self.warm_op_timeout_ms == 0 {
            return Err(CacheError::Configuration(
                "warm_op_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.batch_concurrency == 0 {
            return Err(CacheError::Configuration(
                "batch_concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn hot_ttl(&self) -> Duration {
        Duration::from_millis(self.hot_cache_ttl_ms)
    }

    pub fn warm_op_timeout(&self) -> Duration {
        Duration::from_millis(self.warm_op_timeout_ms)
    }

    /// Build the namespaced warm-tier key for a raw cache key
    pub fn namespaced_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        CacheConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_max_size_rejected() {
        let config = CacheConfig {
            max_hot_cache_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn test_namespace_with_separator_rejected() {
        let config = CacheConfig {
            namespace: "stream:cache".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_namespaced_key() {
        let config = CacheConfig::default();
        assert_eq!(config.namespaced_key("q:AAPL"), "stream_cache:q:AAPL");
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.toml");
        std::fs::write(
            &path,
            r#"
namespace = "ticks"
warm_url = "redis://cache:6379"
hot_cache_ttl_ms = 15000
warm_cache_ttl_secs = 120
max_hot_cache_size = 5000
cleanup_interval_ms = 2000
auto_placement_max_points = 50
warm_op_timeout_ms = 100
batch_concurrency = 8
"#,
        )
        .unwrap();

        let config = CacheConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.namespace, "ticks");
        assert_eq!(config.hot_cache_ttl_ms, 15_000);
        assert_eq!(config.auto_placement_max_points, 50);
    }

    #[test]
    fn test_from_missing_file_is_configuration_error() {
        let err = CacheConfig::from_toml_file("/nonexistent/cache.toml").unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }
}
