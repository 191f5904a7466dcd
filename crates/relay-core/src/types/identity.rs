//! The authenticated principal behind a connection.

use serde::{Deserialize, Serialize};

use super::id::IdentityId;

/// An authenticated identity, normalized from either credential shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend-issued identifier.
    pub id: IdentityId,
    /// Role name (lower-cased).
    pub role: String,
    /// Capabilities granted to the identity.
    pub permissions: Vec<String>,
    /// Name shown to other participants.
    pub display_name: String,
    /// Contact email, if the backend supplied one.
    pub email: Option<String>,
}

impl Identity {
    /// Whether the identity carries the given capability.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    /// Name of the private channel every admitted connection joins.
    pub fn private_channel(&self) -> String {
        format!("private-identity.{}", self.id)
    }
}
