//! Prometheus metrics shared across runtime components.

#![allow(missing_docs)]

use prometheus::{register_counter, register_int_counter, register_int_gauge, Counter, IntCounter, IntGauge};
use std::sync::LazyLock;

/// Total `ConfigTracker` check cycles.
pub static CONFIG_TRACKER_POLLS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "ocr_config_tracker_polls_total",
        "Total number of ConfigTracker check cycles"
    )
    .unwrap()
});

/// Total check cycles that found a change but were still within the
/// confirmation window.
pub static CONFIG_TRACKER_AWAITING_CONFIRMATION_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "ocr_config_tracker_awaiting_confirmation_total",
        "Total number of check cycles that deferred an unconfirmed config change"
    )
    .unwrap()
});

/// Unix timestamp of the most recent digest change emitted by the tracker.
pub static CONFIG_TRACKER_LAST_DIGEST_CHANGE_TIMESTAMP_SECONDS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "ocr_config_tracker_last_digest_change_timestamp_seconds",
        "Unix timestamp of the most recent digest change emitted by the tracker"
    )
    .unwrap()
});

/// Total garbage-collection passes that completed without error.
pub static GARBAGE_COLLECTOR_RUNS_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter!(
        "ocr_garbage_collector_runs_total",
        "Total number of completed garbage-collection passes"
    )
    .unwrap()
});

/// Total telemetry entries dropped, by cause (serialization failure or a full
/// buffer on the sender side).
pub static TELEMETRY_DROPPED_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter!(
        "ocr_telemetry_dropped_total",
        "Total number of telemetry entries dropped before reaching the monitoring endpoint"
    )
    .unwrap()
});

/// Total `configChanged` invocations that resulted in a running inner
/// protocol subtree.
pub static SUPERVISOR_CONFIG_CHANGES_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    register_counter!(
        "ocr_supervisor_config_changes_total",
        "Total number of configChanged invocations that started a new inner protocol subtree"
    )
    .unwrap()
});
