//! Client connections: handles, transport state, pool, heartbeat.

pub mod handle;
pub mod heartbeat;
pub mod pool;

pub use handle::{ConnectionHandle, ConnectionInfo, ConnectionState, Transport};
pub use heartbeat::{HeartbeatConfig, run_heartbeat};
pub use pool::ConnectionPool;
