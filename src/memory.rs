//! In-process memory tier.
//!
//! A plain map guarded by a poison-recovering `RwLock`. Volatile across
//! restarts, no lifecycle, no I/O; expiration is checked lazily on reads and
//! eagerly by [`CacheTier::clean_expired`].

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::entry::{CacheEntry, now_ms};
use crate::error::CacheError;
use crate::lock::{rw_read, rw_write};
use crate::tier::{CacheTier, TierStats};

const SOURCE: &str = "strati::memory";

/// Volatile in-process tier.
#[derive(Default)]
pub struct MemoryTier {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "set").insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = now_ms();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "remove").remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "clear").clear();
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let now = now_ms();
        let mut entries = rw_write(&self.entries, SOURCE, "contains");
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    async fn clean_expired(&self) -> Result<usize, CacheError> {
        let now = now_ms();
        let mut entries = rw_write(&self.entries, SOURCE, "clean_expired");
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    async fn stats(&self) -> Result<TierStats, CacheError> {
        let now = now_ms();
        let entries = rw_read(&self.entries, SOURCE, "stats");
        let mut stats = TierStats::default();
        for (key, entry) in entries.iter() {
            if entry.is_expired(now) {
                stats.expired_count += 1;
            } else {
                stats.count += 1;
                stats.keys.insert(key.clone());
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn set_get_round_trip() {
        let tier = MemoryTier::new();
        tier.set("a", CacheEntry::new(json!({"n": 1}), None))
            .await
            .expect("set");

        let value = tier.get("a").await.expect("get").expect("cached value");
        assert_eq!(value, json!({"n": 1}));
        assert!(tier.contains("a").await.expect("contains"));
    }

    #[tokio::test]
    async fn overwrite_is_last_write_wins() {
        let tier = MemoryTier::new();
        tier.set("a", CacheEntry::new(json!(1), None))
            .await
            .expect("set");
        tier.set("a", CacheEntry::new(json!(2), None))
            .await
            .expect("set");

        assert_eq!(tier.get("a").await.expect("get"), Some(json!(2)));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_none_and_is_evicted() {
        let tier = MemoryTier::new();
        tier.set(
            "a",
            CacheEntry::new(json!("soon gone"), Some(Duration::from_millis(20))),
        )
        .await
        .expect("set");

        assert!(tier.get("a").await.expect("get").is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(tier.get("a").await.expect("get"), None);
        // Eviction happened on the read, not just at sweep time.
        let stats = tier.stats().await.expect("stats");
        assert_eq!(stats.count, 0);
        assert_eq!(stats.expired_count, 0);
    }

    #[tokio::test]
    async fn contains_evicts_expired_entries() {
        let tier = MemoryTier::new();
        tier.set(
            "a",
            CacheEntry::new(json!(1), Some(Duration::from_millis(10))),
        )
        .await
        .expect("set");

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!tier.contains("a").await.expect("contains"));
        assert_eq!(tier.stats().await.expect("stats").count, 0);
    }

    #[tokio::test]
    async fn clean_expired_keeps_ttl_free_entries() {
        let tier = MemoryTier::new();
        tier.set("keep", CacheEntry::new(json!("forever"), None))
            .await
            .expect("set");
        tier.set(
            "drop",
            CacheEntry::new(json!("brief"), Some(Duration::from_millis(10))),
        )
        .await
        .expect("set");

        tokio::time::sleep(Duration::from_millis(30)).await;

        let removed = tier.clean_expired().await.expect("clean");
        assert_eq!(removed, 1);
        assert!(tier.contains("keep").await.expect("contains"));
        assert!(!tier.contains("drop").await.expect("contains"));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let tier = MemoryTier::new();
        tier.set("a", CacheEntry::new(json!(1), None))
            .await
            .expect("set");

        tier.clear().await.expect("first clear");
        assert_eq!(tier.stats().await.expect("stats").count, 0);

        tier.clear().await.expect("second clear");
        assert_eq!(tier.stats().await.expect("stats").count, 0);
    }

    #[tokio::test]
    async fn stats_tracks_keys() {
        let tier = MemoryTier::new();
        tier.set("a", CacheEntry::new(json!(1), None))
            .await
            .expect("set");
        tier.set("b", CacheEntry::new(json!(2), None))
            .await
            .expect("set");

        let stats = tier.stats().await.expect("stats");
        assert_eq!(stats.count, 2);
        assert!(stats.keys.contains("a"));
        assert!(stats.keys.contains("b"));
    }
}
