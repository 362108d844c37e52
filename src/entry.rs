//! The cache entry envelope and its JSON codec.
//!
//! Every tier stores values wrapped in a [`CacheEntry`] carrying creation and
//! expiration timestamps in epoch milliseconds. The serialized form is the
//! wire envelope `{ "value": ..., "expireTime": <ms|null>, "createdAt": <ms> }`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::CacheError;

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// A cached value together with its lifetime metadata.
///
/// `expire_time`, when present, is always `>= created_at`; an entry without
/// one never expires on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub value: Value,
    pub created_at: i64,
    #[serde(default)]
    pub expire_time: Option<i64>,
}

impl CacheEntry {
    /// Wrap a value, stamping it with the current time and an optional TTL.
    pub fn new(value: Value, ttl: Option<Duration>) -> Self {
        let created_at = now_ms();
        let expire_time = ttl.map(|d| created_at + d.as_millis() as i64);
        Self {
            value,
            created_at,
            expire_time,
        }
    }

    /// Whether the entry has expired as of `now` (epoch ms). An entry is
    /// expired at exactly `expire_time`, not one tick later.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expire_time.is_some_and(|t| now >= t)
    }

    /// Serialize the envelope to its JSON wire form.
    pub fn encode(&self) -> Result<String, CacheError> {
        serde_json::to_string(self).map_err(|err| CacheError::unsupported(err.to_string()))
    }

    /// Parse an envelope from its JSON wire form.
    ///
    /// A payload that does not parse, or that carries an expiry earlier than
    /// its creation time, is reported as [`CacheError::CorruptEntry`].
    pub fn decode(raw: &str) -> Result<Self, CacheError> {
        let entry: CacheEntry =
            serde_json::from_str(raw).map_err(|err| CacheError::corrupt(err.to_string()))?;
        if let Some(expire_time) = entry.expire_time {
            if expire_time < entry.created_at {
                return Err(CacheError::corrupt(format!(
                    "expireTime {expire_time} precedes createdAt {}",
                    entry.created_at
                )));
            }
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let entry = CacheEntry::new(
            json!({"name": "Ana", "tags": ["a", "b"], "n": 3}),
            Some(Duration::from_millis(500)),
        );
        let raw = entry.encode().expect("encode");
        let decoded = CacheEntry::decode(&raw).expect("decode");
        assert_eq!(decoded, entry);
    }

    #[test]
    fn wire_form_uses_camel_case_fields() {
        let entry = CacheEntry::new(json!(1), None);
        let raw = entry.encode().expect("encode");
        assert!(raw.contains("\"createdAt\""));
        assert!(raw.contains("\"expireTime\":null"));
    }

    #[test]
    fn decode_accepts_missing_expire_time() {
        let decoded = CacheEntry::decode(r#"{"value":"x","createdAt":10}"#).expect("decode");
        assert_eq!(decoded.expire_time, None);
        assert!(!decoded.is_expired(i64::MAX));
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        for raw in ["", "{", "[1,2]", r#"{"value":1}"#] {
            let err = CacheEntry::decode(raw).expect_err("should not decode");
            assert!(matches!(err, CacheError::CorruptEntry { .. }), "{raw:?}");
        }
    }

    #[test]
    fn decode_rejects_expiry_before_creation() {
        let raw = r#"{"value":1,"createdAt":100,"expireTime":50}"#;
        let err = CacheEntry::decode(raw).expect_err("should not decode");
        assert!(matches!(err, CacheError::CorruptEntry { .. }));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let entry = CacheEntry {
            value: json!(true),
            created_at: 0,
            expire_time: Some(100),
        };
        assert!(!entry.is_expired(99));
        assert!(entry.is_expired(100));
        assert!(entry.is_expired(101));
    }

    #[test]
    fn no_ttl_never_expires() {
        let entry = CacheEntry::new(json!("keep"), None);
        assert!(!entry.is_expired(now_ms() + 1_000_000));
    }
}
