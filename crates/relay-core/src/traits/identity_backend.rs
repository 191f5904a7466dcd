//! Boundary to the external identity backend that verifies opaque credentials.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::id::IdentityId;

/// A verified identity record as returned by the backend, after envelope
/// normalization. Optional fields are defaulted by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendIdentity {
    /// Backend-issued identifier.
    pub id: IdentityId,
    /// Contact email.
    pub email: Option<String>,
    /// Role name, if the backend reports one.
    pub role: Option<String>,
    /// Capability list; `None` when the backend omitted it entirely.
    pub permissions: Option<Vec<String>>,
    /// Display name, if any.
    pub display_name: Option<String>,
}

/// Failure modes of a backend verification call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Network failure, timeout, or server-side error.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    /// The backend answered and refused the credential.
    #[error("backend rejected credential (status {status})")]
    Rejected {
        /// HTTP status returned by the backend.
        status: u16,
    },
    /// The backend answered with a body that does not describe an identity.
    #[error("unrecognized backend response: {0}")]
    InvalidResponse(String),
}

/// Verifies opaque-reference credentials against the application backend.
#[async_trait]
pub trait IdentityBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Verify a credential and return the identity it belongs to.
    async fn verify(&self, credential: &str) -> Result<BackendIdentity, BackendError>;
}
