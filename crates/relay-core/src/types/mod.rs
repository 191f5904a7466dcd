//! Shared domain types.

pub mod id;
pub mod identity;

pub use id::{ConnectionId, IdentityId};
pub use identity::Identity;
