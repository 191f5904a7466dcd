//! HTTP identity backend client.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use relay_core::config::IdentityBackendConfig;
use relay_core::error::AppError;
use relay_core::traits::identity_backend::{BackendError, BackendIdentity, IdentityBackend};

use super::normalize::normalize_identity;

/// Verifies opaque credentials by calling the application backend over HTTP.
///
/// Sends `GET {base_url}{verify_path}` with the credential as a bearer token
/// and the gateway's API key in `X-Api-Key`.
#[derive(Debug, Clone)]
pub struct HttpIdentityBackend {
    /// Shared HTTP client with the configured timeout.
    client: reqwest::Client,
    /// Full verification URL.
    verify_url: String,
    /// Gateway API key.
    api_key: String,
}

impl HttpIdentityBackend {
    /// Creates a backend client from configuration.
    pub fn new(config: &IdentityBackendConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            verify_url: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.verify_path
            ),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityBackend for HttpIdentityBackend {
    async fn verify(&self, credential: &str) -> Result<BackendIdentity, BackendError> {
        let response = self
            .client
            .get(&self.verify_url)
            .bearer_auth(credential)
            .header("X-Api-Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Identity backend request failed");
                BackendError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!(status = status.as_u16(), "Identity backend rejected credential");
                return Err(BackendError::Rejected {
                    status: status.as_u16(),
                });
            }
            s if !s.is_success() => {
                warn!(status = s.as_u16(), "Identity backend returned an error status");
                return Err(BackendError::Unreachable(format!("status {}", s.as_u16())));
            }
            _ => {}
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("body is not JSON: {e}")))?;

        normalize_identity(&body)
    }
}
