use std::sync::Once;

use metrics::{Unit, describe_counter};

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Register descriptions for the counters emitted by the coordinator's
/// observability hook. Safe to call more than once.
pub(crate) fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "strati_cache_hit_total",
            Unit::Count,
            "Reads that returned a live value, labelled by tier."
        );
        describe_counter!(
            "strati_cache_miss_total",
            Unit::Count,
            "Reads that found nothing live, labelled by tier."
        );
        describe_counter!(
            "strati_cache_write_total",
            Unit::Count,
            "Completed mutating operations, labelled by tier."
        );
        describe_counter!(
            "strati_cache_error_total",
            Unit::Count,
            "Tier failures absorbed by the coordinator, labelled by tier."
        );
        describe_counter!(
            "strati_cache_expired_removed_total",
            Unit::Count,
            "Entries removed by expiry sweeps, labelled by tier."
        );
    });
}
