//! Tier selection heuristic.
//!
//! Maps caller-declared workload hints to the backend best suited to hold the
//! data. Pure and deterministic: no I/O, no hidden state, identical inputs
//! always produce the identical tier.

use serde::{Deserialize, Serialize};

use crate::tier::TierType;

/// Caller-declared hints about a value and how it will be accessed.
///
/// These are not measured at runtime; they describe intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadDescriptor {
    /// Rough serialized size of the value in bytes.
    pub approx_size_bytes: u64,
    /// Whether the value must survive a process restart.
    pub needs_persistence: bool,
    /// Whether the value is read on a hot path.
    pub frequent_access: bool,
    /// Whether the value will be fetched via predicate or batch queries.
    pub needs_query: bool,
}

/// Recommend a tier for a workload.
///
/// Precedence: a query requirement always wins, since only the queryable tier
/// supports predicate access. Absent persistence need, memory is cheapest.
/// Large, cold, persistent data goes to the queryable tier instead of holding
/// it in the faster file box. Everything else defaults to persistent as the
/// balanced choice.
pub fn select_tier(workload: &WorkloadDescriptor, large_value_threshold_bytes: u64) -> TierType {
    if workload.needs_query {
        return TierType::Queryable;
    }
    if !workload.needs_persistence {
        return TierType::Memory;
    }
    if workload.approx_size_bytes > large_value_threshold_bytes && !workload.frequent_access {
        return TierType::Queryable;
    }
    TierType::Persistent
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u64 = 1024 * 1024;

    fn descriptor(
        approx_size_bytes: u64,
        needs_persistence: bool,
        frequent_access: bool,
        needs_query: bool,
    ) -> WorkloadDescriptor {
        WorkloadDescriptor {
            approx_size_bytes,
            needs_persistence,
            frequent_access,
            needs_query,
        }
    }

    #[test]
    fn query_need_always_wins() {
        for size in [0, 10, 2_000_000] {
            for persistence in [false, true] {
                for frequent in [false, true] {
                    let workload = descriptor(size, persistence, frequent, true);
                    assert_eq!(select_tier(&workload, THRESHOLD), TierType::Queryable);
                }
            }
        }
    }

    #[test]
    fn no_persistence_goes_to_memory() {
        let workload = descriptor(10, false, true, false);
        assert_eq!(select_tier(&workload, THRESHOLD), TierType::Memory);

        // Size does not matter when nothing has to survive a restart.
        let workload = descriptor(50_000_000, false, false, false);
        assert_eq!(select_tier(&workload, THRESHOLD), TierType::Memory);
    }

    #[test]
    fn large_cold_persistent_goes_to_queryable() {
        let workload = descriptor(2_000_000, true, false, false);
        assert_eq!(select_tier(&workload, THRESHOLD), TierType::Queryable);
    }

    #[test]
    fn large_hot_persistent_stays_persistent() {
        let workload = descriptor(2_000_000, true, true, false);
        assert_eq!(select_tier(&workload, THRESHOLD), TierType::Persistent);
    }

    #[test]
    fn threshold_is_exclusive() {
        // Exactly at the threshold still counts as "not large".
        let workload = descriptor(THRESHOLD, true, false, false);
        assert_eq!(select_tier(&workload, THRESHOLD), TierType::Persistent);

        let workload = descriptor(THRESHOLD + 1, true, false, false);
        assert_eq!(select_tier(&workload, THRESHOLD), TierType::Queryable);
    }

    #[test]
    fn small_persistent_defaults_to_persistent() {
        let workload = descriptor(512, true, false, false);
        assert_eq!(select_tier(&workload, THRESHOLD), TierType::Persistent);
    }

    #[test]
    fn selection_is_deterministic() {
        let workload = descriptor(2_000_000, true, false, false);
        let first = select_tier(&workload, THRESHOLD);
        let second = select_tier(&workload, THRESHOLD);
        assert_eq!(first, second);
    }
}
