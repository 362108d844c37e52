//! Cache configuration.
//!
//! All knobs have fixed defaults matching the original heuristics; hosts that
//! need different paths or windows override them at construction time or via
//! a deserialized config section.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_PERSISTENT_DIR: &str = "cache/box";
const DEFAULT_QUERYABLE_DB_PATH: &str = "cache/cache.db";
const DEFAULT_QUERYABLE_TTL_MS: u64 = 7 * 24 * 60 * 60 * 1000;
const DEFAULT_LARGE_VALUE_THRESHOLD_BYTES: u64 = 1024 * 1024;
const DEFAULT_QUERYABLE_MAX_CONNECTIONS: u32 = 4;

/// Configuration for the cache subsystem.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the persistent tier's entry files.
    pub persistent_dir: PathBuf,
    /// SQLite database file backing the queryable tier.
    pub queryable_db_path: PathBuf,
    /// Expiration window applied to queryable-tier writes without a TTL (ms).
    pub queryable_default_ttl_ms: u64,
    /// Size above which cold persistent data is steered to the queryable tier.
    pub large_value_threshold_bytes: u64,
    /// Connection pool size for the queryable tier.
    pub queryable_max_connections: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistent_dir: PathBuf::from(DEFAULT_PERSISTENT_DIR),
            queryable_db_path: PathBuf::from(DEFAULT_QUERYABLE_DB_PATH),
            queryable_default_ttl_ms: DEFAULT_QUERYABLE_TTL_MS,
            large_value_threshold_bytes: DEFAULT_LARGE_VALUE_THRESHOLD_BYTES,
            queryable_max_connections: DEFAULT_QUERYABLE_MAX_CONNECTIONS,
        }
    }
}

impl CacheConfig {
    /// The queryable tier's default expiration window as a `Duration`.
    pub fn queryable_default_ttl(&self) -> Duration {
        Duration::from_millis(self.queryable_default_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.persistent_dir, PathBuf::from("cache/box"));
        assert_eq!(config.queryable_db_path, PathBuf::from("cache/cache.db"));
        assert_eq!(config.queryable_default_ttl_ms, 604_800_000);
        assert_eq!(config.large_value_threshold_bytes, 1_048_576);
        assert_eq!(config.queryable_max_connections, 4);
    }

    #[test]
    fn default_ttl_as_duration() {
        let config = CacheConfig {
            queryable_default_ttl_ms: 1500,
            ..Default::default()
        };
        assert_eq!(config.queryable_default_ttl(), Duration::from_millis(1500));
    }

    #[test]
    fn deserializes_with_partial_overrides() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"queryable_default_ttl_ms": 60000}"#).expect("deserialize");
        assert_eq!(config.queryable_default_ttl_ms, 60_000);
        assert_eq!(config.persistent_dir, PathBuf::from("cache/box"));
    }
}
