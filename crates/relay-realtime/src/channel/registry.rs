//! Channel registry: channels, subscribers, and the reverse index.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use relay_core::types::id::ConnectionId;

use super::channel::{Channel, ChannelInfo};
use super::subscription::SubscriptionTracker;

/// Result of a subscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The connection joined the channel.
    Added,
    /// The connection was already subscribed.
    AlreadySubscribed,
    /// The precondition failed; nothing changed.
    Rejected,
}

/// Both indexes, always mutated together.
#[derive(Debug, Default)]
struct Indexes {
    /// Channel name → Channel. Present iff it has at least one subscriber.
    channels: HashMap<String, Channel>,
    /// Connection → channel names.
    subscriptions: SubscriptionTracker,
}

impl Indexes {
    fn remove_subscriber(
        &mut self,
        channel_name: &str,
        conn_id: &ConnectionId,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(channel) = self.channels.get_mut(channel_name) else {
            return false;
        };
        let removed = channel.unsubscribe(conn_id, now);
        if channel.is_empty() {
            self.channels.remove(channel_name);
        }
        removed
    }
}

/// Registry of all active channels.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    /// Forward and reverse indexes under one lock.
    inner: RwLock<Indexes>,
}

impl ChannelRegistry {
    /// Creates a new channel registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a connection to a channel.
    pub fn subscribe(&self, channel_name: &str, conn_id: ConnectionId) -> SubscribeOutcome {
        self.subscribe_if(channel_name, conn_id, || true)
    }

    /// Subscribes a connection if `precondition` holds while the write lock is held.
    ///
    /// Connection teardown marks the connection closed before it clears its
    /// subscriptions, so checking liveness here means a subscribe racing a
    /// disconnect can never leave a dangling entry behind.
    pub fn subscribe_if(
        &self,
        channel_name: &str,
        conn_id: ConnectionId,
        precondition: impl FnOnce() -> bool,
    ) -> SubscribeOutcome {
        let now = Utc::now();
        let mut inner = self.inner.write();
        if !precondition() {
            return SubscribeOutcome::Rejected;
        }
        if inner.subscriptions.contains(&conn_id, channel_name) {
            return SubscribeOutcome::AlreadySubscribed;
        }

        inner
            .channels
            .entry(channel_name.to_string())
            .or_insert_with(|| Channel::new(channel_name.to_string(), now))
            .subscribe(conn_id, now);
        inner.subscriptions.add(conn_id, channel_name.to_string());
        SubscribeOutcome::Added
    }

    /// Unsubscribes a connection from a channel. Returns whether it was subscribed.
    pub fn unsubscribe(&self, channel_name: &str, conn_id: ConnectionId) -> bool {
        let now = Utc::now();
        let mut inner = self.inner.write();
        inner.subscriptions.remove(&conn_id, channel_name);
        inner.remove_subscriber(channel_name, &conn_id, now)
    }

    /// Unsubscribes a connection from all channels. Returns the channels it left.
    pub fn unsubscribe_all(&self, conn_id: ConnectionId) -> Vec<String> {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let channels = inner.subscriptions.remove_all(&conn_id);
        for channel_name in &channels {
            inner.remove_subscriber(channel_name, &conn_id, now);
        }
        let mut channels: Vec<String> = channels.into_iter().collect();
        channels.sort();
        channels
    }

    /// Returns all subscriber connection IDs for a channel.
    pub fn get_subscribers(&self, channel_name: &str) -> Vec<ConnectionId> {
        self.inner
            .read()
            .channels
            .get(channel_name)
            .map(Channel::get_subscribers)
            .unwrap_or_default()
    }

    /// Returns the channels a connection is subscribed to, sorted.
    pub fn get_channels(&self, conn_id: ConnectionId) -> Vec<String> {
        self.inner.read().subscriptions.get_channels(&conn_id)
    }

    /// Whether the connection is subscribed to the channel.
    pub fn is_subscribed(&self, channel_name: &str, conn_id: ConnectionId) -> bool {
        self.inner.read().subscriptions.contains(&conn_id, channel_name)
    }

    /// Returns the subscription count for a connection.
    pub fn subscription_count(&self, conn_id: ConnectionId) -> usize {
        self.inner.read().subscriptions.count(&conn_id)
    }

    /// Returns subscriber count for a channel.
    pub fn channel_subscriber_count(&self, channel_name: &str) -> usize {
        self.inner
            .read()
            .channels
            .get(channel_name)
            .map_or(0, Channel::subscriber_count)
    }

    /// Records publish activity on a channel.
    pub fn touch(&self, channel_name: &str) {
        if let Some(channel) = self.inner.write().channels.get_mut(channel_name) {
            channel.last_activity = Utc::now();
        }
    }

    /// Metadata for one channel.
    pub fn channel_info(&self, channel_name: &str) -> Option<ChannelInfo> {
        self.inner.read().channels.get(channel_name).map(Channel::info)
    }

    /// Metadata for every channel, sorted by name.
    pub fn list_channels(&self) -> Vec<ChannelInfo> {
        let mut channels: Vec<ChannelInfo> =
            self.inner.read().channels.values().map(Channel::info).collect();
        channels.sort_by(|a, b| a.name.cmp(&b.name));
        channels
    }

    /// Returns total number of active channels.
    pub fn channel_count(&self) -> usize {
        self.inner.read().channels.len()
    }
}
