//! Structured credential issuance, for trusted backends and test fixtures.

use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use relay_core::config::AuthConfig;
use relay_core::error::AppError;
use relay_core::types::identity::Identity;

use super::claims::Claims;

/// Creates signed structured credentials with the shared secret.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder").finish()
    }
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// Signs a token for `identity` that expires after `ttl`.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.id.clone(),
            role: Some(identity.role.clone()),
            permissions: Some(identity.permissions.clone()),
            name: Some(identity.display_name.clone()),
            email: identity.email.clone(),
            iat: Some(now.timestamp()),
            exp: (now + ttl).timestamp(),
        };
        self.encode_claims(&claims)
    }

    /// Signs arbitrary claims.
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))
    }
}
