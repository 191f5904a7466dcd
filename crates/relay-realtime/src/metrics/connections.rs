//! Connection metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record an admitted connection.
pub fn record_admitted(metrics: &EngineMetrics) {
    metrics.connections_total.fetch_add(1, Ordering::Relaxed);
    metrics.connections_active.fetch_add(1, Ordering::Relaxed);
}

/// Record a rejected admission by reason code.
pub fn record_rejected(metrics: &EngineMetrics, reason: &str) {
    let counter = match reason {
        "THROTTLED" => &metrics.rejected_throttled,
        "DUPLICATE_CONNECTION" => &metrics.rejected_duplicate,
        "GLOBAL_LIMIT" => &metrics.rejected_global_limit,
        _ => return,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Record a closed connection.
pub fn record_closed(metrics: &EngineMetrics) {
    let _ = metrics
        .connections_active
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
}
