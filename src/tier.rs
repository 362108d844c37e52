//! Tier identity, the storage-tier contract, and cache statistics.
//!
//! Every backend implements [`CacheTier`]; the coordinator routes calls
//! through this trait so callers never see which store holds their data.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::CacheEntry;
use crate::error::CacheError;

/// Identifies one of the three cache backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierType {
    /// In-process map; volatile across restarts.
    Memory,
    /// Durable file-backed key-value box.
    Persistent,
    /// SQLite table supporting predicate queries and batch access.
    Queryable,
}

impl TierType {
    /// All tiers, in sweep order.
    pub const ALL: [TierType; 3] = [TierType::Memory, TierType::Persistent, TierType::Queryable];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierType::Memory => "memory",
            TierType::Persistent => "persistent",
            TierType::Queryable => "queryable",
        }
    }
}

impl fmt::Display for TierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts and keys for a single tier.
///
/// `count` covers live entries only; `expired_count` is entries still stored
/// but past their expiry, awaiting a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierStats {
    pub count: usize,
    pub expired_count: usize,
    pub keys: HashSet<String>,
}

/// Aggregated view across all tiers.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub memory: TierStats,
    pub persistent: TierStats,
    pub queryable: TierStats,
    /// Sum of live entry counts across tiers.
    pub total_count: usize,
}

impl CacheStats {
    pub fn tier(&self, tier: TierType) -> &TierStats {
        match tier {
            TierType::Memory => &self.memory,
            TierType::Persistent => &self.persistent,
            TierType::Queryable => &self.queryable,
        }
    }
}

/// Uniform contract implemented by every storage tier.
///
/// Implementations do no logging of their own; failures are returned to the
/// coordinator, which decides how to report them. Same-key writes are
/// last-write-wins with no ordering beyond what the backing store provides.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Store an entry, overwriting any existing one under the key.
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<(), CacheError>;

    /// Fetch the value for a key. An expired entry reads as `None` and is
    /// evicted as a side effect of the read.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Drop the entry for a key, if any.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Drop every entry in the tier. Safe to call on an empty tier.
    async fn clear(&self) -> Result<(), CacheError>;

    /// Whether a live (non-expired) entry exists under the key.
    async fn contains(&self, key: &str) -> Result<bool, CacheError>;

    /// Eagerly remove every expired entry; returns how many were dropped.
    async fn clean_expired(&self) -> Result<usize, CacheError>;

    /// Current counts and key set for the tier.
    async fn stats(&self) -> Result<TierStats, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_names_are_stable() {
        assert_eq!(TierType::Memory.as_str(), "memory");
        assert_eq!(TierType::Persistent.as_str(), "persistent");
        assert_eq!(TierType::Queryable.as_str(), "queryable");
        assert_eq!(TierType::Queryable.to_string(), "queryable");
    }

    #[test]
    fn stats_lookup_by_tier() {
        let stats = CacheStats {
            memory: TierStats {
                count: 2,
                ..Default::default()
            },
            persistent: TierStats {
                count: 1,
                ..Default::default()
            },
            queryable: TierStats::default(),
            total_count: 3,
        };
        assert_eq!(stats.tier(TierType::Memory).count, 2);
        assert_eq!(stats.tier(TierType::Persistent).count, 1);
        assert_eq!(stats.tier(TierType::Queryable).count, 0);
    }
}
