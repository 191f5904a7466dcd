//! Role ranking for channel authorization.

pub mod hierarchy;

pub use hierarchy::RoleHierarchy;
