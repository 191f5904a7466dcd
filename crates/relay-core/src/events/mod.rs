//! Gateway events reported to the observability collaborator.
//!
//! Events are fire-and-forget: the core emits them through an
//! [`EventRecorder`](crate::traits::EventRecorder) and never waits on or
//! inspects the outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::id::{ConnectionId, IdentityId};

/// Direction of a subscription change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionAction {
    /// A connection joined a channel.
    Subscribed,
    /// A connection left a channel.
    Unsubscribed,
    /// A subscribe request was denied.
    Denied,
}

/// Something noteworthy that happened inside the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A credential was validated (or not).
    AuthOutcome {
        /// Identity, when validation succeeded.
        identity_id: Option<IdentityId>,
        /// Whether the result came from the validation cache.
        cached: bool,
        /// `None` on success, otherwise the failure reason code.
        failure: Option<String>,
    },
    /// A connection became active.
    ConnectionAdmitted {
        /// The new connection.
        connection_id: ConnectionId,
        /// Its identity.
        identity_id: IdentityId,
    },
    /// A connection attempt was turned away.
    ConnectionRejected {
        /// Identity that tried to connect.
        identity_id: IdentityId,
        /// Rejection reason code.
        reason: String,
    },
    /// An active connection went away.
    ConnectionClosed {
        /// The closed connection.
        connection_id: ConnectionId,
        /// Its identity.
        identity_id: IdentityId,
        /// Why it closed.
        reason: String,
    },
    /// Channel membership changed.
    SubscriptionChanged {
        /// The connection concerned.
        connection_id: ConnectionId,
        /// Channel name.
        channel: String,
        /// What happened.
        action: SubscriptionAction,
    },
}

impl GatewayEvent {
    /// Short name used as a metrics label and log field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthOutcome { .. } => "auth_outcome",
            Self::ConnectionAdmitted { .. } => "connection_admitted",
            Self::ConnectionRejected { .. } => "connection_rejected",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::SubscriptionChanged { .. } => "subscription_changed",
        }
    }
}

/// An event stamped with the time it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event.
    #[serde(flatten)]
    pub event: GatewayEvent,
}

impl RecordedEvent {
    /// Stamp an event with the current time.
    pub fn now(event: GatewayEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
