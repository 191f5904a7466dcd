//! Inbound and outbound WebSocket frame definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use relay_core::types::id::{ConnectionId, IdentityId};

/// Frames sent by the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Subscribe to a channel.
    Subscribe {
        /// Channel name.
        channel: String,
    },
    /// Unsubscribe from a channel.
    Unsubscribe {
        /// Channel name.
        channel: String,
    },
    /// Pong response to a server ping.
    Pong {
        /// Echoed timestamp.
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Client-initiated keepalive.
    Ping {
        /// Client timestamp, echoed back.
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

/// Frames sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Connection admitted.
    Connected {
        /// Server-assigned connection id.
        connection_id: ConnectionId,
        /// Authenticated identity.
        identity_id: IdentityId,
        /// Private channel joined automatically.
        channel: String,
    },
    /// Subscription confirmed.
    Subscribed {
        /// Channel name.
        channel: String,
    },
    /// Unsubscription confirmed.
    Unsubscribed {
        /// Channel name.
        channel: String,
    },
    /// Event published on a channel.
    Event {
        /// Channel the event was published on.
        channel: String,
        /// Event name.
        event: String,
        /// Event payload.
        data: serde_json::Value,
        /// When the event was published.
        timestamp: DateTime<Utc>,
    },
    /// Server keepalive.
    Ping {
        /// Server timestamp (ms since epoch).
        timestamp: i64,
    },
    /// Reply to a client ping.
    Pong {
        /// Echoed or server timestamp.
        timestamp: i64,
    },
    /// Request-level error; the connection stays open.
    Error {
        /// Stable reason code.
        code: String,
        /// Human-readable description.
        message: String,
    },
    /// The server is closing the connection.
    Disconnected {
        /// Why the connection is being closed.
        reason: String,
    },
}

impl OutboundMessage {
    /// Builds an error frame.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Builds a ping frame stamped with the current time.
    pub fn ping() -> Self {
        Self::Ping {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Serializes the frame to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
