//! Collaborator traits defined in `relay-core` and implemented by other crates.

pub mod identity_backend;
pub mod recorder;
pub mod resource_access;

pub use identity_backend::{BackendError, BackendIdentity, IdentityBackend};
pub use recorder::{EventRecorder, NoopRecorder};
pub use resource_access::ResourceAccessCheck;
