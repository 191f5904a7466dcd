//! Credential validator: authenticates a bearer credential into an [`Identity`].
//!
//! Flow:
//! 1. Parse the credential shape (`|` ⇒ opaque-reference, otherwise JWT).
//! 2. Serve from the validation cache when possible.
//! 3. Opaque: ask the identity backend, bounded by a timeout.
//!    Structured: verify signature and expiry locally.
//! 4. Normalize into an [`Identity`], default-assign permissions when none
//!    were reported, and require the notification capability.
//! 5. Cache the result.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use relay_core::config::AuthConfig;
use relay_core::error::{AppError, AuthFailure};
use relay_core::events::GatewayEvent;
use relay_core::traits::identity_backend::{BackendError, BackendIdentity, IdentityBackend};
use relay_core::traits::recorder::EventRecorder;
use relay_core::types::id::IdentityId;
use relay_core::types::identity::Identity;

use crate::backend::HttpIdentityBackend;
use crate::cache::ValidationCache;
use crate::credential::Credential;
use crate::jwt::{Claims, JwtDecoder};

/// Timeout used when no backend section is configured.
const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Authenticates bearer credentials of either shape, with caching.
#[derive(Debug)]
pub struct CredentialValidator {
    /// Structured credential verifier.
    decoder: JwtDecoder,
    /// Identity backend for opaque credentials.
    backend: Option<Arc<dyn IdentityBackend>>,
    /// Successful validations.
    cache: ValidationCache,
    /// Bound on a single backend call.
    backend_timeout: Duration,
    /// Capability every identity must carry.
    required_permission: String,
    /// Role used when none is reported.
    default_role: String,
    /// Observability sink.
    recorder: Arc<dyn EventRecorder>,
}

impl CredentialValidator {
    /// Creates a validator with an explicit backend.
    pub fn new(
        config: &AuthConfig,
        backend: Option<Arc<dyn IdentityBackend>>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            decoder: JwtDecoder::new(config)?,
            backend,
            cache: ValidationCache::new(config),
            backend_timeout: config
                .backend
                .as_ref()
                .map(|b| b.timeout())
                .unwrap_or(DEFAULT_BACKEND_TIMEOUT),
            required_permission: config.required_permission.clone(),
            default_role: config.default_role.trim().to_lowercase(),
            recorder,
        })
    }

    /// Creates a validator whose backend (if any) is the configured HTTP backend.
    pub fn from_config(
        config: &AuthConfig,
        recorder: Arc<dyn EventRecorder>,
    ) -> Result<Self, AppError> {
        let backend = match &config.backend {
            Some(backend_config) => {
                let backend: Arc<dyn IdentityBackend> =
                    Arc::new(HttpIdentityBackend::new(backend_config)?);
                Some(backend)
            }
            None => None,
        };
        Self::new(config, backend, recorder)
    }

    /// Validates a bearer credential.
    pub async fn validate(&self, raw: &str) -> Result<Identity, AuthFailure> {
        let result = self.validate_inner(raw).await;

        let event = match &result {
            Ok((identity, cached)) => GatewayEvent::AuthOutcome {
                identity_id: Some(identity.id.clone()),
                cached: *cached,
                failure: None,
            },
            Err(failure) => GatewayEvent::AuthOutcome {
                identity_id: None,
                cached: false,
                failure: Some(failure.code().to_string()),
            },
        };
        self.recorder.record(event);

        result.map(|(identity, _)| identity)
    }

    async fn validate_inner(&self, raw: &str) -> Result<(Identity, bool), AuthFailure> {
        let credential = Credential::parse(raw)?;

        if let Some(identity) = self.cache.get(&credential).await {
            debug!(identity_id = %identity.id, "Credential served from cache");
            return Ok((identity, true));
        }

        let (identity, expires_at) = match &credential {
            Credential::Structured { token } => self.validate_structured(token)?,
            Credential::OpaqueReference { raw, .. } => (self.validate_opaque(raw).await?, None),
        };

        self.cache.insert(&credential, identity.clone(), expires_at).await;
        info!(
            identity_id = %identity.id,
            role = %identity.role,
            opaque = credential.is_opaque(),
            "Credential validated"
        );
        Ok((identity, false))
    }

    fn validate_structured(
        &self,
        token: &str,
    ) -> Result<(Identity, Option<DateTime<Utc>>), AuthFailure> {
        let claims: Claims = self.decoder.decode(token)?;
        let expires_at = structured_expiry(claims.expires_at(), self.decoder.leeway_seconds());
        let identity = self.build_identity(
            claims.sub,
            claims.role,
            claims.permissions,
            claims.name,
            claims.email,
        )?;
        Ok((identity, Some(expires_at)))
    }

    async fn validate_opaque(&self, credential: &str) -> Result<Identity, AuthFailure> {
        let backend = self.backend.as_ref().ok_or_else(|| {
            AuthFailure::BackendUnreachable("no identity backend configured".into())
        })?;

        let verified = tokio::time::timeout(self.backend_timeout, backend.verify(credential))
            .await
            .map_err(|_| {
                warn!(
                    timeout_ms = self.backend_timeout.as_millis() as u64,
                    "Identity backend timed out"
                );
                AuthFailure::BackendUnreachable("identity backend timed out".into())
            })?;

        let BackendIdentity {
            id,
            email,
            role,
            permissions,
            display_name,
        } = verified.map_err(|e| match e {
            BackendError::Rejected { status } => {
                AuthFailure::CredentialRejected(format!("backend answered {status}"))
            }
            BackendError::Unreachable(msg) | BackendError::InvalidResponse(msg) => {
                AuthFailure::BackendUnreachable(msg)
            }
        })?;

        self.build_identity(id, role, permissions, display_name, email)
    }

    fn build_identity(
        &self,
        id: IdentityId,
        role: Option<String>,
        permissions: Option<Vec<String>>,
        display_name: Option<String>,
        email: Option<String>,
    ) -> Result<Identity, AuthFailure> {
        let permissions = permissions.unwrap_or_else(|| vec![self.required_permission.clone()]);
        if !permissions.iter().any(|p| *p == self.required_permission) {
            return Err(AuthFailure::InsufficientPermission(
                self.required_permission.clone(),
            ));
        }

        let role = role
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.default_role.clone());

        let display_name = display_name
            .or_else(|| email.clone())
            .unwrap_or_else(|| id.to_string());

        Ok(Identity {
            id,
            role,
            permissions,
            display_name,
            email,
        })
    }

    /// Drops any cached validation for `raw`.
    pub async fn invalidate(&self, raw: &str) {
        if let Ok(credential) = Credential::parse(raw) {
            self.cache.invalidate(&credential).await;
        }
    }

    /// The validation cache.
    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }
}

/// Token expiry plus leeway, saturating at the latest representable instant.
fn structured_expiry(expires_at: DateTime<Utc>, leeway_seconds: u64) -> DateTime<Utc> {
    i64::try_from(leeway_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|leeway| expires_at.checked_add_signed(leeway))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
