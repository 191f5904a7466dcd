//! Message metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record frames queued to clients.
pub fn record_sent(metrics: &EngineMetrics, count: u64) {
    metrics.messages_sent.fetch_add(count, Ordering::Relaxed);
}

/// Record a frame received from a client.
pub fn record_received(metrics: &EngineMetrics) {
    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
}
