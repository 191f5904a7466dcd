//! Connection admission and liveness configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Admission control, throttling, and liveness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum live connections per identity.
    #[serde(default = "default_max_per_identity")]
    pub max_connections_per_identity: usize,
    /// Length of the attempt-throttling window in milliseconds.
    #[serde(default = "default_throttle_window")]
    pub throttle_window_ms: u64,
    /// Attempts allowed per identity within one window.
    #[serde(default = "default_max_attempts")]
    pub max_attempts_per_window: u32,
    /// Inactivity after which a connection is considered dead, in milliseconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_ms: u64,
    /// Maximum active connections across the whole gateway.
    #[serde(default = "default_global_max")]
    pub global_max_connections: usize,
    /// Interval between server pings on idle connections, in milliseconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Interval of the liveness sweep, in milliseconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
    /// Outbound frame buffer per connection.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// Maximum channel subscriptions per connection.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions_per_connection: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_connections_per_identity: default_max_per_identity(),
            throttle_window_ms: default_throttle_window(),
            max_attempts_per_window: default_max_attempts(),
            connection_timeout_ms: default_connection_timeout(),
            global_max_connections: default_global_max(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            sweep_interval_ms: default_sweep_interval(),
            channel_buffer_size: default_channel_buffer(),
            max_subscriptions_per_connection: default_max_subscriptions(),
        }
    }
}

impl AdmissionConfig {
    /// Throttle window as a [`chrono::Duration`].
    pub fn throttle_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.throttle_window_ms as i64)
    }

    /// Liveness timeout as a [`chrono::Duration`].
    pub fn connection_timeout(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.connection_timeout_ms as i64)
    }

    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Sweep interval as a [`Duration`].
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn default_max_per_identity() -> usize {
    1
}

fn default_throttle_window() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    60_000
}

fn default_global_max() -> usize {
    10_000
}

fn default_heartbeat_interval() -> u64 {
    25_000
}

fn default_sweep_interval() -> u64 {
    30_000
}

fn default_channel_buffer() -> usize {
    256
}

fn default_max_subscriptions() -> usize {
    50
}
