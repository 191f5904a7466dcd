//! Credential validation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Credential validation and caching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret for structured (JWT) credentials.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Signature algorithms accepted for structured credentials.
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<String>,
    /// Clock-skew leeway applied to the expiry claim, in seconds.
    #[serde(default)]
    pub jwt_leeway_seconds: u64,
    /// Capability an identity must carry to connect.
    #[serde(default = "default_required_permission")]
    pub required_permission: String,
    /// Role assigned when neither token nor backend reports one.
    #[serde(default = "default_role")]
    pub default_role: String,
    /// Lifetime of a cached validation in milliseconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_ms: u64,
    /// Cache size above which expired entries are pruned.
    #[serde(default = "default_prune_threshold")]
    pub cache_prune_threshold: u64,
    /// Identity backend for opaque-reference credentials.
    #[serde(default)]
    pub backend: Option<IdentityBackendConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            allowed_algorithms: default_allowed_algorithms(),
            jwt_leeway_seconds: 0,
            required_permission: default_required_permission(),
            default_role: default_role(),
            cache_ttl_ms: default_cache_ttl(),
            cache_prune_threshold: default_prune_threshold(),
            backend: None,
        }
    }
}

impl AuthConfig {
    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// HTTP identity backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityBackendConfig {
    /// Base URL of the application backend, e.g. `https://app.example.com`.
    pub base_url: String,
    /// Path of the credential verification endpoint.
    #[serde(default = "default_verify_path")]
    pub verify_path: String,
    /// API key identifying the gateway to the backend.
    #[serde(default)]
    pub api_key: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
}

impl IdentityBackendConfig {
    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_jwt_secret() -> String {
    "CHANGE_ME_IN_PRODUCTION".to_string()
}

fn default_allowed_algorithms() -> Vec<String> {
    vec!["HS256".to_string()]
}

fn default_required_permission() -> String {
    "receive-notifications".to_string()
}

fn default_role() -> String {
    "member".to_string()
}

fn default_cache_ttl() -> u64 {
    300_000
}

fn default_prune_threshold() -> u64 {
    1000
}

fn default_verify_path() -> String {
    "/api/user".to_string()
}

fn default_backend_timeout() -> u64 {
    15_000
}
