//! Gateway metrics and the default event recorder.

pub mod auth;
pub mod channels;
pub mod connections;
pub mod messages;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use relay_core::events::{GatewayEvent, RecordedEvent, SubscriptionAction};
use relay_core::traits::recorder::EventRecorder;

/// Number of recent events kept for inspection.
const RECENT_EVENTS: usize = 128;

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total connections admitted.
    pub connections_total: AtomicU64,
    /// Connections currently active.
    pub connections_active: AtomicU64,
    /// Admissions refused by attempt throttling.
    pub rejected_throttled: AtomicU64,
    /// Admissions refused because the identity was already connected.
    pub rejected_duplicate: AtomicU64,
    /// Admissions refused at global capacity.
    pub rejected_global_limit: AtomicU64,
    /// Successful credential validations.
    pub auth_success: AtomicU64,
    /// Validations served from cache.
    pub auth_cache_hits: AtomicU64,
    /// Failed credential validations.
    pub auth_failures: AtomicU64,
    /// Total subscribe operations.
    pub subscriptions_total: AtomicU64,
    /// Total unsubscribe operations.
    pub unsubscriptions_total: AtomicU64,
    /// Subscribe requests denied.
    pub subscriptions_denied: AtomicU64,
    /// Frames queued to clients.
    pub messages_sent: AtomicU64,
    /// Frames received from clients.
    pub messages_received: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            connections_total: load(&self.connections_total),
            connections_active: load(&self.connections_active),
            rejected_throttled: load(&self.rejected_throttled),
            rejected_duplicate: load(&self.rejected_duplicate),
            rejected_global_limit: load(&self.rejected_global_limit),
            auth_success: load(&self.auth_success),
            auth_cache_hits: load(&self.auth_cache_hits),
            auth_failures: load(&self.auth_failures),
            subscriptions_total: load(&self.subscriptions_total),
            unsubscriptions_total: load(&self.unsubscriptions_total),
            subscriptions_denied: load(&self.subscriptions_denied),
            messages_sent: load(&self.messages_sent),
            messages_received: load(&self.messages_received),
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total connections admitted.
    pub connections_total: u64,
    /// Connections currently active.
    pub connections_active: u64,
    /// Admissions refused by attempt throttling.
    pub rejected_throttled: u64,
    /// Admissions refused because the identity was already connected.
    pub rejected_duplicate: u64,
    /// Admissions refused at global capacity.
    pub rejected_global_limit: u64,
    /// Successful credential validations.
    pub auth_success: u64,
    /// Validations served from cache.
    pub auth_cache_hits: u64,
    /// Failed credential validations.
    pub auth_failures: u64,
    /// Total subscribe operations.
    pub subscriptions_total: u64,
    /// Total unsubscribe operations.
    pub unsubscriptions_total: u64,
    /// Subscribe requests denied.
    pub subscriptions_denied: u64,
    /// Frames queued to clients.
    pub messages_sent: u64,
    /// Frames received from clients.
    pub messages_received: u64,
}

/// Default [`EventRecorder`]: counts events and logs them.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    /// Counters.
    metrics: EngineMetrics,
    /// Most recent events, oldest first.
    recent: Mutex<VecDeque<RecordedEvent>>,
}

impl MetricsRecorder {
    /// Creates a recorder with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Counter snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Most recent events, oldest first.
    pub fn recent_events(&self) -> Vec<RecordedEvent> {
        self.recent.lock().iter().cloned().collect()
    }
}

impl EventRecorder for MetricsRecorder {
    fn record(&self, event: GatewayEvent) {
        match &event {
            GatewayEvent::AuthOutcome {
                identity_id,
                cached,
                failure,
            } => match failure {
                None => {
                    auth::record_success(&self.metrics, *cached);
                    debug!(identity_id = ?identity_id, cached, "Authenticated");
                }
                Some(reason) => {
                    auth::record_failure(&self.metrics);
                    info!(reason = %reason, "Authentication failed");
                }
            },
            GatewayEvent::ConnectionAdmitted {
                connection_id,
                identity_id,
            } => {
                connections::record_admitted(&self.metrics);
                info!(conn_id = %connection_id, identity_id = %identity_id, "Connection admitted");
            }
            GatewayEvent::ConnectionRejected {
                identity_id,
                reason,
            } => {
                connections::record_rejected(&self.metrics, reason);
                info!(identity_id = %identity_id, reason = %reason, "Connection rejected");
            }
            GatewayEvent::ConnectionClosed {
                connection_id,
                identity_id,
                reason,
            } => {
                connections::record_closed(&self.metrics);
                info!(
                    conn_id = %connection_id,
                    identity_id = %identity_id,
                    reason = %reason,
                    "Connection closed"
                );
            }
            GatewayEvent::SubscriptionChanged {
                connection_id,
                channel,
                action,
            } => {
                channels::record_change(&self.metrics, *action);
                if *action == SubscriptionAction::Denied {
                    info!(conn_id = %connection_id, channel = %channel, "Subscription denied");
                } else {
                    debug!(
                        conn_id = %connection_id,
                        channel = %channel,
                        action = ?action,
                        "Subscription changed"
                    );
                }
            }
        }

        let mut recent = self.recent.lock();
        if recent.len() == RECENT_EVENTS {
            recent.pop_front();
        }
        recent.push_back(RecordedEvent::now(event));
    }
}
