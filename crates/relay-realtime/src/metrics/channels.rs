//! Channel metrics helpers.

use std::sync::atomic::Ordering;

use relay_core::events::SubscriptionAction;

use super::EngineMetrics;

/// Record a subscription change.
pub fn record_change(metrics: &EngineMetrics, action: SubscriptionAction) {
    let counter = match action {
        SubscriptionAction::Subscribed => &metrics.subscriptions_total,
        SubscriptionAction::Unsubscribed => &metrics.unsubscriptions_total,
        SubscriptionAction::Denied => &metrics.subscriptions_denied,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}
