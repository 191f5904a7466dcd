//! Credential validation metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record a successful validation.
pub fn record_success(metrics: &EngineMetrics, cached: bool) {
    metrics.auth_success.fetch_add(1, Ordering::Relaxed);
    if cached {
        metrics.auth_cache_hits.fetch_add(1, Ordering::Relaxed);
    }
}

/// Record a failed validation.
pub fn record_failure(metrics: &EngineMetrics) {
    metrics.auth_failures.fetch_add(1, Ordering::Relaxed);
}
