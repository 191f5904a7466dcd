//! # relay-realtime
//!
//! Realtime side of the notification relay. Provides:
//!
//! - Connection admission with attempt throttling, per-identity and global
//!   limits, and liveness sweeping
//! - Channel authorization by naming pattern, role rank, and resource ACL
//! - The subscription registry (channel ⇄ connection indexes)
//! - The gateway session tying validation, admission, and subscriptions
//!   together for the WebSocket layer

pub mod admission;
pub mod channel;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod server;

pub use admission::AdmissionController;
pub use channel::{ChannelAuthorizer, ChannelRegistry, SubscribeOutcome};
pub use connection::{ConnectionHandle, ConnectionState, Transport};
pub use message::{InboundMessage, OutboundMessage};
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use server::{GatewaySession, GatewayStats};
