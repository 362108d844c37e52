//! strati — a client-side multi-tier cache.
//!
//! Three interchangeable tiers behind one coordinator:
//!
//! - **Memory**: in-process map, volatile across restarts
//! - **Persistent**: durable file-backed key-value box
//! - **Queryable**: SQLite table with predicate queries and batch access
//!
//! Callers address a tier explicitly, or describe their workload and let the
//! selection heuristic pick one. Expiration is uniform across tiers; the
//! cache is best-effort by contract, so a tier fault degrades to a miss or a
//! dropped write instead of breaking the caller.
//!
//! ```no_run
//! use strati::{CacheConfig, CacheCoordinator, TierType};
//!
//! # async fn demo() -> Result<(), strati::CacheError> {
//! let cache = CacheCoordinator::new(CacheConfig::default());
//! cache.init().await?;
//!
//! cache.set("user:1", &"Ana", None, TierType::Memory).await?;
//! let name: Option<String> = cache.get("user:1", TierType::Memory).await?;
//! assert_eq!(name.as_deref(), Some("Ana"));
//!
//! cache.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod coordinator;
mod entry;
mod error;
mod lock;
mod memory;
mod persistent;
mod queryable;
mod selector;
mod telemetry;
mod tier;

pub use config::CacheConfig;
pub use coordinator::CacheCoordinator;
pub use entry::CacheEntry;
pub use error::CacheError;
pub use memory::MemoryTier;
pub use persistent::PersistentTier;
pub use queryable::QueryableTier;
pub use selector::{WorkloadDescriptor, select_tier};
pub use tier::{CacheStats, CacheTier, TierStats, TierType};
