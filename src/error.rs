use thiserror::Error;

use crate::tier::TierType;

/// Failures the cache subsystem can report.
///
/// Most of these never reach callers of the coordinator: routed reads degrade
/// to a miss and routed writes to a no-op, with the failure reported through
/// the observability hook instead. Only `init`/`close` surface errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A durable tier was used before `init()` opened its backing store.
    #[error("{tier} tier used before init()")]
    NotInitialized { tier: TierType },

    /// A stored envelope failed to decode; treated as a miss and the record
    /// is deleted.
    #[error("corrupt cache entry: {detail}")]
    CorruptEntry { detail: String },

    /// The caller's value cannot be serialized for storage.
    #[error("unsupported cache value: {detail}")]
    UnsupportedValue { detail: String },

    /// The backing store failed to open or answer.
    #[error("{tier} tier backend unavailable: {message}")]
    BackendUnavailable { tier: TierType, message: String },

    /// No tier is mapped for a workload. The selector is total over its
    /// inputs, so this is only reachable if the tier set is extended.
    #[error("no tier mapped for the given workload")]
    UnknownTier,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn not_initialized(tier: TierType) -> Self {
        Self::NotInitialized { tier }
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptEntry {
            detail: detail.into(),
        }
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            detail: detail.into(),
        }
    }

    pub fn backend(tier: TierType, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            tier,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_tier() {
        let err = CacheError::not_initialized(TierType::Queryable);
        assert_eq!(err.to_string(), "queryable tier used before init()");

        let err = CacheError::backend(TierType::Persistent, "disk full");
        assert!(err.to_string().contains("persistent"));
        assert!(err.to_string().contains("disk full"));
    }
}
