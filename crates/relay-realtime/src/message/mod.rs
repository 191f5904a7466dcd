//! WebSocket frame types and validation.

pub mod types;
pub mod validator;

pub use types::{InboundMessage, OutboundMessage};
pub use validator::parse_inbound;
