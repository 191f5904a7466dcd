//! Subscription tracking: which channels each connection is subscribed to.

use std::collections::{HashMap, HashSet};

use relay_core::types::id::ConnectionId;

/// Connection-to-channel reverse index.
///
/// Not synchronized on its own; it lives inside the registry's lock.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    /// Connection ID → set of channel names.
    conn_to_channels: HashMap<ConnectionId, HashSet<String>>,
}

impl SubscriptionTracker {
    /// Creates a new subscription tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a subscription.
    pub fn add(&mut self, conn_id: ConnectionId, channel: String) {
        self.conn_to_channels
            .entry(conn_id)
            .or_default()
            .insert(channel);
    }

    /// Removes a subscription, dropping the connection entry when it empties.
    pub fn remove(&mut self, conn_id: &ConnectionId, channel: &str) {
        if let Some(channels) = self.conn_to_channels.get_mut(conn_id) {
            channels.remove(channel);
            if channels.is_empty() {
                self.conn_to_channels.remove(conn_id);
            }
        }
    }

    /// Whether the connection is subscribed to the channel.
    pub fn contains(&self, conn_id: &ConnectionId, channel: &str) -> bool {
        self.conn_to_channels
            .get(conn_id)
            .is_some_and(|channels| channels.contains(channel))
    }

    /// Gets all channels a connection is subscribed to, sorted.
    pub fn get_channels(&self, conn_id: &ConnectionId) -> Vec<String> {
        let mut channels: Vec<String> = self
            .conn_to_channels
            .get(conn_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// Returns the number of subscriptions for a connection.
    pub fn count(&self, conn_id: &ConnectionId) -> usize {
        self.conn_to_channels.get(conn_id).map_or(0, HashSet::len)
    }

    /// Removes all subscriptions for a connection.
    pub fn remove_all(&mut self, conn_id: &ConnectionId) -> HashSet<String> {
        self.conn_to_channels.remove(conn_id).unwrap_or_default()
    }
}
