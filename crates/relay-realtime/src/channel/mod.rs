//! Channels: naming patterns, authorization, and the subscription registry.

pub mod authorizer;
pub mod channel;
pub mod registry;
pub mod resource_acl;
pub mod subscription;
pub mod types;

pub use authorizer::ChannelAuthorizer;
pub use channel::ChannelInfo;
pub use registry::{ChannelRegistry, SubscribeOutcome};
pub use resource_acl::HttpResourceAccess;
pub use types::ChannelType;
