//! Individual client connection handle and its transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use relay_core::types::id::{ConnectionId, IdentityId};
use relay_core::types::identity::Identity;

use crate::message::types::OutboundMessage;

/// Lifecycle of a client connection.
///
/// `Connecting → Authenticating → Active → Closed`; any state may jump to
/// `Closed`, and nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    /// Socket open, credential not yet validated.
    Connecting = 0,
    /// Credential valid, admission in progress.
    Authenticating = 1,
    /// Admitted; may subscribe and receive events.
    Active = 2,
    /// Gone.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Authenticating,
            2 => Self::Active,
            _ => Self::Closed,
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Authenticating, Active)
                | (Connecting | Authenticating | Active, Closed)
        )
    }
}

/// Outbound half of a client socket plus its lifecycle state.
///
/// Created by the transport layer when a socket opens, before the client is
/// authenticated. The cancellation token fires when either side closes.
#[derive(Debug)]
pub struct Transport {
    /// Sender for outbound frames.
    sender: mpsc::Sender<OutboundMessage>,
    /// Current [`ConnectionState`].
    state: AtomicU8,
    /// Whether the underlying socket is still open.
    connected: AtomicBool,
    /// Fired when the connection goes away.
    cancel: CancellationToken,
}

impl Transport {
    /// Creates a transport with a bounded outbound buffer.
    pub fn new(buffer_size: usize) -> (Arc<Self>, mpsc::Receiver<OutboundMessage>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        let transport = Arc::new(Self {
            sender,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            connected: AtomicBool::new(true),
            cancel: CancellationToken::new(),
        });
        (transport, receiver)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Moves to `next` if the transition is legal. Returns whether it moved.
    pub fn advance(&self, next: ConnectionState) -> bool {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                ConnectionState::from_u8(current)
                    .can_transition_to(next)
                    .then_some(next as u8)
            })
            .is_ok()
    }

    /// Whether the socket is still open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Token cancelled when the connection goes away.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Called by the socket loop when the client side closed.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Closes from the server side.
    pub fn close(&self) {
        self.state
            .store(ConnectionState::Closed as u8, Ordering::SeqCst);
        self.mark_disconnected();
    }

    /// Queues a frame. Returns `false` if it was dropped.
    pub fn send(&self, msg: OutboundMessage) -> bool {
        if !self.is_connected() {
            return false;
        }
        match self.sender.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Outbound buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_disconnected();
                false
            }
        }
    }
}

/// A handle to an admitted connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Authenticated identity behind the connection.
    pub identity: Identity,
    /// When the connection was admitted.
    pub connected_at: DateTime<Utc>,
    /// Last inbound activity, ms since epoch.
    last_activity: AtomicI64,
    /// Socket side.
    transport: Arc<Transport>,
}

impl ConnectionHandle {
    /// Creates a handle admitted at `now`.
    pub fn new_at(identity: Identity, transport: Arc<Transport>, now: DateTime<Utc>) -> Self {
        Self {
            id: ConnectionId::new(),
            identity,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp_millis()),
            transport,
        }
    }

    /// Identity id shortcut.
    pub fn identity_id(&self) -> &IdentityId {
        &self.identity.id
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Whether the connection may subscribe and receive events.
    pub fn is_active(&self) -> bool {
        self.state() == ConnectionState::Active && self.transport.is_connected()
    }

    /// Records inbound activity now.
    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    /// Records inbound activity at `now`.
    pub fn touch_at(&self, now: DateTime<Utc>) {
        self.last_activity
            .fetch_max(now.timestamp_millis(), Ordering::SeqCst);
    }

    /// Last inbound activity.
    pub fn last_activity(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_activity.load(Ordering::SeqCst))
            .single()
            .unwrap_or(self.connected_at)
    }

    /// Fails the liveness check: transport gone or idle for `timeout`.
    pub fn is_stale_at(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        !self.transport.is_connected() || now - self.last_activity() >= timeout
    }

    /// Queues a frame for the client.
    pub fn send(&self, msg: OutboundMessage) -> bool {
        let sent = self.transport.send(msg);
        if !sent {
            tracing::debug!(conn_id = %self.id, "Frame not delivered");
        }
        sent
    }

    /// Tells the client why, then closes the transport.
    pub fn close(&self, reason: &str) {
        if !self.transport.advance(ConnectionState::Closed) {
            return;
        }
        self.send(OutboundMessage::Disconnected {
            reason: reason.to_string(),
        });
        self.transport.mark_disconnected();
    }

    /// Snapshot of connection info.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            identity_id: self.identity.id.clone(),
            role: self.identity.role.clone(),
            state: self.state(),
            connected_at: self.connected_at,
            last_activity: self.last_activity(),
        }
    }
}

/// Snapshot of connection info (serializable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Connection ID.
    pub id: ConnectionId,
    /// Identity ID.
    pub identity_id: IdentityId,
    /// Role.
    pub role: String,
    /// Lifecycle state.
    pub state: ConnectionState,
    /// Connected at.
    pub connected_at: DateTime<Utc>,
    /// Last activity.
    pub last_activity: DateTime<Utc>,
}
