//! Unified error types for the relay gateway.
//!
//! The three rejection families ([`AuthFailure`], [`AdmissionRejection`],
//! [`AuthorizationDenial`]) are returned as typed results by the subsystems
//! that produce them. Each carries a stable reason code (see `code()`) and a
//! human-readable message. At crate boundaries they are folded into
//! [`AppError`] so callers can propagate with `?`.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::id::{ConnectionId, IdentityId};

/// Top-level error kind categorization used across the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The credential could not be parsed.
    Format,
    /// The identity backend could not be reached or timed out.
    AuthBackend,
    /// The credential was understood but rejected.
    AuthRejected,
    /// The connection was not admitted.
    AdmissionRejected,
    /// A channel subscription was denied.
    AuthorizationDenied,
    /// The connection went away while an operation was in flight.
    Cancelled,
    /// The referenced connection or channel does not exist.
    NotFound,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format => write!(f, "FORMAT"),
            Self::AuthBackend => write!(f, "AUTH_BACKEND"),
            Self::AuthRejected => write!(f, "AUTH_REJECTED"),
            Self::AdmissionRejected => write!(f, "ADMISSION_REJECTED"),
            Self::AuthorizationDenied => write!(f, "AUTHORIZATION_DENIED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Reasons a credential fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// The credential matches neither accepted shape.
    #[error("malformed credential: {0}")]
    Format(String),
    /// The identity backend was unreachable, timed out, or broke its contract.
    #[error("identity backend unavailable: {0}")]
    BackendUnreachable(String),
    /// The structured credential's expiry claim is in the past.
    #[error("credential has expired")]
    Expired,
    /// The structured credential's signature or algorithm is not acceptable.
    #[error("credential signature mismatch")]
    SignatureMismatch,
    /// The identity backend refused the opaque credential.
    #[error("credential rejected by identity backend: {0}")]
    CredentialRejected(String),
    /// The identity lacks the capability required to receive notifications.
    #[error("identity lacks required permission '{0}'")]
    InsufficientPermission(String),
}

impl AuthFailure {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Format(_) => "FORMAT_ERROR",
            Self::BackendUnreachable(_) => "AUTH_BACKEND_UNREACHABLE",
            Self::Expired => "CREDENTIAL_EXPIRED",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::CredentialRejected(_) => "CREDENTIAL_REJECTED",
            Self::InsufficientPermission(_) => "INSUFFICIENT_PERMISSION",
        }
    }

    /// Only backend outages are worth retrying; everything else fails the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnreachable(_))
    }

    fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) => ErrorKind::Format,
            Self::BackendUnreachable(_) => ErrorKind::AuthBackend,
            _ => ErrorKind::AuthRejected,
        }
    }
}

/// Reasons a connection attempt is not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionRejection {
    /// Too many attempts inside the throttle window.
    #[error("too many connection attempts ({attempts}), retry after {retry_after}")]
    Throttled {
        /// Attempts recorded in the current window, including this one.
        attempts: u32,
        /// When the current window ends.
        retry_after: DateTime<Utc>,
    },
    /// The identity already holds its maximum number of live connections.
    #[error("identity {identity_id} already connected via {existing}")]
    Duplicate {
        /// Identity that tried to connect.
        identity_id: IdentityId,
        /// The live connection that blocks this one.
        existing: ConnectionId,
        /// When the existing connection was established.
        connected_at: DateTime<Utc>,
    },
    /// The gateway is at its global connection capacity.
    #[error("gateway at capacity ({limit} connections)")]
    GlobalLimit {
        /// Configured global maximum.
        limit: usize,
    },
}

impl AdmissionRejection {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Throttled { .. } => "THROTTLED",
            Self::Duplicate { .. } => "DUPLICATE_CONNECTION",
            Self::GlobalLimit { .. } => "GLOBAL_LIMIT",
        }
    }
}

/// Reasons a channel subscription is denied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationDenial {
    /// The channel name matches no known pattern.
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
    /// The identity's role ranks below the channel class threshold.
    #[error("role '{actual}' is below required role '{required}'")]
    RoleInsufficient {
        /// Minimum role for the channel class.
        required: String,
        /// Role of the requesting identity.
        actual: String,
    },
    /// The channel belongs to someone else or the resource check said no.
    #[error("access to '{0}' is forbidden")]
    ResourceForbidden(String),
}

impl AuthorizationDenial {
    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownChannel(_) => "UNKNOWN_CHANNEL",
            Self::RoleInsufficient { .. } => "ROLE_INSUFFICIENT",
            Self::ResourceForbidden(_) => "RESOURCE_FORBIDDEN",
        }
    }
}

/// The unified gateway error.
///
/// Subsystem errors are mapped into `AppError` via `From` impls so that the
/// session layer can use `?` while still reporting the original reason code.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// Stable reason code.
    pub code: &'static str,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        code: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, "CANCELLED", message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, "NOT_FOUND", message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, "CONFIGURATION", message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, "INTERNAL", message)
    }

    /// Returns the auth failure behind this error, if any.
    pub fn as_auth_failure(&self) -> Option<&AuthFailure> {
        self.source.as_ref()?.downcast_ref::<AuthFailure>()
    }

    /// Returns the admission rejection behind this error, if any.
    pub fn as_admission_rejection(&self) -> Option<&AdmissionRejection> {
        self.source.as_ref()?.downcast_ref::<AdmissionRejection>()
    }

    /// Returns the authorization denial behind this error, if any.
    pub fn as_authorization_denial(&self) -> Option<&AuthorizationDenial> {
        self.source.as_ref()?.downcast_ref::<AuthorizationDenial>()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            code: self.code,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<AuthFailure> for AppError {
    fn from(err: AuthFailure) -> Self {
        Self::with_source(err.kind(), err.code(), err.to_string(), err)
    }
}

impl From<AdmissionRejection> for AppError {
    fn from(err: AdmissionRejection) -> Self {
        Self::with_source(
            ErrorKind::AdmissionRejected,
            err.code(),
            err.to_string(),
            err,
        )
    }
}

impl From<AuthorizationDenial> for AppError {
    fn from(err: AuthorizationDenial) -> Self {
        Self::with_source(
            ErrorKind::AuthorizationDenied,
            err.code(),
            err.to_string(),
            err,
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            "SERIALIZATION",
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            "CONFIGURATION",
            format!("Configuration error: {err}"),
            err,
        )
    }
}
