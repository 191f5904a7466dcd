//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every field has a default so an empty file is a valid config.

pub mod admission;
pub mod app;
pub mod auth;
pub mod channels;
pub mod logging;

use serde::{Deserialize, Serialize};

pub use self::admission::AdmissionConfig;
pub use self::app::ServerConfig;
pub use self::auth::{AuthConfig, IdentityBackendConfig};
pub use self::channels::{ChannelAccessConfig, ResourceAclConfig, ResourceAclMode};
pub use self::logging::{LogFormat, LoggingConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// WebSocket listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential validation settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Admission control settings.
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Channel authorization settings.
    #[serde(default)]
    pub channels: ChannelAccessConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `RELAY__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from an inline TOML document.
    pub fn from_toml(source: &str) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make admission or authorization meaningless.
    pub fn validate(&self) -> Result<(), AppError> {
        let admission = &self.admission;
        if admission.max_connections_per_identity == 0 {
            return Err(AppError::configuration(
                "admission.max_connections_per_identity must be at least 1",
            ));
        }
        if admission.throttle_window_ms == 0 || admission.max_attempts_per_window == 0 {
            return Err(AppError::configuration(
                "admission throttle window and attempt limit must be non-zero",
            ));
        }
        if admission.connection_timeout_ms == 0 || admission.global_max_connections == 0 {
            return Err(AppError::configuration(
                "admission.connection_timeout_ms and global_max_connections must be non-zero",
            ));
        }
        if admission.heartbeat_interval_ms == 0 || admission.sweep_interval_ms == 0 {
            return Err(AppError::configuration(
                "heartbeat and sweep intervals must be non-zero",
            ));
        }
        if admission.channel_buffer_size == 0 {
            return Err(AppError::configuration(
                "admission.channel_buffer_size must be non-zero",
            ));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(AppError::configuration("auth.jwt_secret must not be empty"));
        }
        if self.auth.allowed_algorithms.is_empty() {
            return Err(AppError::configuration(
                "auth.allowed_algorithms must list at least one algorithm",
            ));
        }
        for alg in &self.auth.allowed_algorithms {
            if !matches!(alg.as_str(), "HS256" | "HS384" | "HS512") {
                return Err(AppError::configuration(format!(
                    "auth.allowed_algorithms: '{alg}' is not a supported HMAC algorithm"
                )));
            }
        }

        let channels = &self.channels;
        if channels.role_hierarchy.is_empty() {
            return Err(AppError::configuration(
                "channels.role_hierarchy must not be empty",
            ));
        }
        for role in [
            &channels.admin_role,
            &channels.moderator_role,
            &channels.resource_min_role,
            &channels.presence_min_role,
        ] {
            if !channels
                .role_hierarchy
                .iter()
                .any(|r| r.eq_ignore_ascii_case(role))
            {
                return Err(AppError::configuration(format!(
                    "channels: role '{role}' is not part of role_hierarchy"
                )));
            }
        }

        Ok(())
    }
}
