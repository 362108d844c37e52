//! The cache coordinator.
//!
//! One facade over the three tiers: routed operations name a tier
//! explicitly, "smart" operations let the selection heuristic pick one, and
//! lifecycle, sweeps and statistics are aggregated here. Tier failures on
//! routed reads and writes never reach the caller: reads degrade to a miss,
//! writes to a no-op, and the failure is reported through the observability
//! hook instead. Only [`CacheCoordinator::init`] and
//! [`CacheCoordinator::close`] surface errors, since those are configuration
//! problems the host should see immediately.

use std::collections::HashMap;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::memory::MemoryTier;
use crate::persistent::PersistentTier;
use crate::queryable::QueryableTier;
use crate::selector::{WorkloadDescriptor, select_tier};
use crate::telemetry;
use crate::tier::{CacheStats, CacheTier, TierStats, TierType};

#[derive(Clone, Copy)]
enum Outcome {
    Hit,
    Miss,
    Write,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::Write => "write",
        }
    }
}

/// Facade owning one instance of each tier.
///
/// Construct it from a [`CacheConfig`] at the application's composition root
/// and pass references around; there are no global instances.
pub struct CacheCoordinator {
    config: CacheConfig,
    memory: MemoryTier,
    persistent: PersistentTier,
    queryable: QueryableTier,
}

impl CacheCoordinator {
    pub fn new(config: CacheConfig) -> Self {
        telemetry::describe_metrics();
        let persistent = PersistentTier::new(config.persistent_dir.clone());
        let queryable = QueryableTier::new(
            config.queryable_db_path.clone(),
            config.queryable_default_ttl(),
            config.queryable_max_connections,
        );
        Self {
            config,
            memory: MemoryTier::new(),
            persistent,
            queryable,
        }
    }

    fn tier(&self, tier: TierType) -> &dyn CacheTier {
        match tier {
            TierType::Memory => &self.memory,
            TierType::Persistent => &self.persistent,
            TierType::Queryable => &self.queryable,
        }
    }

    /// Open both durable tiers (order-independent) and run one initial
    /// expiry sweep.
    pub async fn init(&self) -> Result<(), CacheError> {
        self.persistent.init().await?;
        self.queryable.init().await?;
        self.clean_all_expired().await
    }

    /// Release the durable tiers' handles.
    pub async fn close(&self) -> Result<(), CacheError> {
        self.persistent.close().await?;
        self.queryable.close().await
    }

    /// Store a value in the given tier, best-effort: a value that cannot be
    /// serialized or a tier fault drops the write and reports it, the call
    /// still completes.
    pub async fn set<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        ttl: Option<Duration>,
        tier: TierType,
    ) -> Result<(), CacheError> {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                self.observe_error("set", tier, key, &CacheError::unsupported(err.to_string()));
                return Ok(());
            }
        };
        match self.tier(tier).set(key, CacheEntry::new(value, ttl)).await {
            Ok(()) => self.observe("set", tier, key, Outcome::Write),
            Err(err) => self.observe_error("set", tier, key, &err),
        }
        Ok(())
    }

    /// Fetch a value from the given tier. Tier faults degrade to a miss; a
    /// value that no longer matches the requested type also reads as a miss
    /// but is left in place.
    pub async fn get<V: DeserializeOwned>(
        &self,
        key: &str,
        tier: TierType,
    ) -> Result<Option<V>, CacheError> {
        match self.tier(tier).get(key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(typed) => {
                    self.observe("get", tier, key, Outcome::Hit);
                    Ok(Some(typed))
                }
                Err(err) => {
                    self.observe_error("get", tier, key, &CacheError::unsupported(err.to_string()));
                    Ok(None)
                }
            },
            Ok(None) => {
                self.observe("get", tier, key, Outcome::Miss);
                Ok(None)
            }
            Err(err) => {
                self.observe_error("get", tier, key, &err);
                Ok(None)
            }
        }
    }

    pub async fn remove(&self, key: &str, tier: TierType) -> Result<(), CacheError> {
        match self.tier(tier).remove(key).await {
            Ok(()) => self.observe("remove", tier, key, Outcome::Write),
            Err(err) => self.observe_error("remove", tier, key, &err),
        }
        Ok(())
    }

    pub async fn clear(&self, tier: TierType) -> Result<(), CacheError> {
        match self.tier(tier).clear().await {
            Ok(()) => self.observe("clear", tier, "*", Outcome::Write),
            Err(err) => self.observe_error("clear", tier, "*", &err),
        }
        Ok(())
    }

    /// Whether a live entry exists in the given tier. Faults read as absent.
    pub async fn contains(&self, key: &str, tier: TierType) -> Result<bool, CacheError> {
        match self.tier(tier).contains(key).await {
            Ok(found) => {
                let outcome = if found { Outcome::Hit } else { Outcome::Miss };
                self.observe("contains", tier, key, outcome);
                Ok(found)
            }
            Err(err) => {
                self.observe_error("contains", tier, key, &err);
                Ok(false)
            }
        }
    }

    /// The tier the selection heuristic recommends for a workload.
    pub fn select_tier_for(&self, workload: &WorkloadDescriptor) -> TierType {
        select_tier(workload, self.config.large_value_threshold_bytes)
    }

    /// `set` routed through the selection heuristic.
    pub async fn set_smart<V: Serialize>(
        &self,
        key: &str,
        value: &V,
        workload: &WorkloadDescriptor,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let tier = self.select_tier_for(workload);
        self.set(key, value, ttl, tier).await
    }

    /// `get` routed through the selection heuristic. The workload must match
    /// the one used on the corresponding `set_smart`, since tiers do not
    /// mirror each other.
    pub async fn get_smart<V: DeserializeOwned>(
        &self,
        key: &str,
        workload: &WorkloadDescriptor,
    ) -> Result<Option<V>, CacheError> {
        let tier = self.select_tier_for(workload);
        self.get(key, tier).await
    }

    /// Batch upsert into the queryable tier, one statement, one shared TTL.
    pub async fn set_batch<V: Serialize>(
        &self,
        entries: &[(String, V)],
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let rows: Vec<(String, Value)> = entries
            .iter()
            .filter_map(|(key, value)| match serde_json::to_value(value) {
                Ok(value) => Some((key.clone(), value)),
                Err(err) => {
                    self.observe_error(
                        "set_batch",
                        TierType::Queryable,
                        key,
                        &CacheError::unsupported(err.to_string()),
                    );
                    None
                }
            })
            .collect();
        match self.queryable.set_batch(&rows, ttl).await {
            Ok(()) => self.observe("set_batch", TierType::Queryable, "*", Outcome::Write),
            Err(err) => self.observe_error("set_batch", TierType::Queryable, "*", &err),
        }
        Ok(())
    }

    /// Batch fetch from the queryable tier. Missing, expired and
    /// type-mismatched entries are simply absent from the result.
    pub async fn get_batch<V: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, V>, CacheError> {
        match self.queryable.get_batch(keys).await {
            Ok(found) => {
                let mut typed = HashMap::new();
                for (key, value) in found {
                    if let Ok(value) = serde_json::from_value(value) {
                        typed.insert(key, value);
                    }
                }
                trace!(
                    requested = keys.len(),
                    found = typed.len(),
                    tier = TierType::Queryable.as_str(),
                    "cache batch read"
                );
                Ok(typed)
            }
            Err(err) => {
                self.observe_error("get_batch", TierType::Queryable, "*", &err);
                Ok(HashMap::new())
            }
        }
    }

    /// Sweep expired entries from every tier. A failing tier is reported and
    /// skipped; the remaining tiers are still swept.
    pub async fn clean_all_expired(&self) -> Result<(), CacheError> {
        for tier in TierType::ALL {
            match self.tier(tier).clean_expired().await {
                Ok(removed) => {
                    counter!("strati_cache_expired_removed_total", "tier" => tier.as_str())
                        .increment(removed as u64);
                    debug!(tier = tier.as_str(), removed, "expiry sweep finished");
                }
                Err(err) => {
                    counter!("strati_cache_error_total", "tier" => tier.as_str()).increment(1);
                    warn!(
                        tier = tier.as_str(),
                        error = %err,
                        "expiry sweep failed; continuing with remaining tiers"
                    );
                }
            }
        }
        Ok(())
    }

    /// Per-tier statistics plus the combined live-entry count. A tier that
    /// cannot answer reports empty stats.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for tier in TierType::ALL {
            let tier_stats = match self.tier(tier).stats().await {
                Ok(tier_stats) => tier_stats,
                Err(err) => {
                    self.observe_error("stats", tier, "*", &err);
                    TierStats::default()
                }
            };
            match tier {
                TierType::Memory => stats.memory = tier_stats,
                TierType::Persistent => stats.persistent = tier_stats,
                TierType::Queryable => stats.queryable = tier_stats,
            }
        }
        stats.total_count =
            stats.memory.count + stats.persistent.count + stats.queryable.count;
        stats
    }

    // Single observability point for routed operations. Emits a trace event
    // and bumps the matching counter; never fails, never blocks.
    fn observe(&self, op: &'static str, tier: TierType, key: &str, outcome: Outcome) {
        match outcome {
            Outcome::Hit => {
                counter!("strati_cache_hit_total", "tier" => tier.as_str()).increment(1);
            }
            Outcome::Miss => {
                counter!("strati_cache_miss_total", "tier" => tier.as_str()).increment(1);
            }
            Outcome::Write => {
                counter!("strati_cache_write_total", "tier" => tier.as_str()).increment(1);
            }
        }
        trace!(
            op,
            tier = tier.as_str(),
            key,
            outcome = outcome.as_str(),
            "cache operation"
        );
    }

    fn observe_error(&self, op: &'static str, tier: TierType, key: &str, err: &CacheError) {
        counter!("strati_cache_error_total", "tier" => tier.as_str()).increment(1);
        warn!(
            op,
            tier = tier.as_str(),
            key,
            error = %err,
            "cache operation degraded"
        );
    }
}
