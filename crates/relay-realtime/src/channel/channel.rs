//! Single channel with subscriber tracking.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::types::id::ConnectionId;

/// A single pub/sub channel with a set of subscribers.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel name.
    pub name: String,
    /// Set of subscribed connection IDs.
    pub subscribers: HashSet<ConnectionId>,
    /// When the first subscriber arrived.
    pub created_at: DateTime<Utc>,
    /// Last subscribe, unsubscribe, or publish.
    pub last_activity: DateTime<Utc>,
}

impl Channel {
    /// Creates a new empty channel.
    pub fn new(name: String, now: DateTime<Utc>) -> Self {
        Self {
            name,
            subscribers: HashSet::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Adds a subscriber. Returns `false` if already present.
    pub fn subscribe(&mut self, conn_id: ConnectionId, now: DateTime<Utc>) -> bool {
        self.last_activity = now;
        self.subscribers.insert(conn_id)
    }

    /// Removes a subscriber. Returns `false` if absent.
    pub fn unsubscribe(&mut self, conn_id: &ConnectionId, now: DateTime<Utc>) -> bool {
        self.last_activity = now;
        self.subscribers.remove(conn_id)
    }

    /// Returns subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns whether the channel has any subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Returns all subscriber connection IDs.
    pub fn get_subscribers(&self) -> Vec<ConnectionId> {
        self.subscribers.iter().copied().collect()
    }

    /// Metadata snapshot.
    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            name: self.name.clone(),
            subscriber_count: self.subscriber_count(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Serializable channel metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel name.
    pub name: String,
    /// Current subscriber count (always at least 1).
    pub subscriber_count: usize,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last activity.
    pub last_activity: DateTime<Utc>,
}
