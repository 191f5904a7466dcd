//! Ping/pong heartbeat for connection keepalive.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use crate::message::types::OutboundMessage;

use super::handle::ConnectionHandle;

/// Heartbeat configuration.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatConfig {
    /// Interval between pings.
    pub ping_interval: Duration,
    /// Inactivity after which the connection is considered dead.
    pub timeout: chrono::Duration,
}

/// Runs the heartbeat loop for a connection.
///
/// Sends periodic pings. When the client has been silent for longer than
/// the timeout the transport is marked disconnected so the next sweep evicts
/// it. Ends when the connection goes away.
pub async fn run_heartbeat(handle: Arc<ConnectionHandle>, config: HeartbeatConfig) {
    let cancel = handle.transport().cancellation().clone();
    let mut interval = time::interval(config.ping_interval);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        if handle.is_stale_at(Utc::now(), config.timeout) {
            tracing::warn!(
                conn_id = %handle.id,
                identity_id = %handle.identity.id,
                "Heartbeat timeout"
            );
            handle.transport().mark_disconnected();
            break;
        }

        if !handle.send(OutboundMessage::ping()) && !handle.transport().is_connected() {
            tracing::debug!(conn_id = %handle.id, "Ping send failed, transport gone");
            break;
        }
    }

    tracing::debug!(conn_id = %handle.id, "Heartbeat loop ended");
}
