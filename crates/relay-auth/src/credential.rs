//! Credential shape detection.
//!
//! A bearer credential is either *opaque-reference* (`"<id>|<secret>"`,
//! verified by the identity backend) or *structured* (a signed JWT). The
//! `|` delimiter decides which.

use relay_core::error::AuthFailure;

/// Delimiter separating id and secret in opaque-reference credentials.
pub const OPAQUE_DELIMITER: char = '|';

/// Number of credential characters used in cache keys.
const CREDENTIAL_PREFIX_LEN: usize = 16;

/// A parsed bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Self-contained signed claims.
    Structured {
        /// The full JWT.
        token: String,
    },
    /// An id/secret pair that only the backend can verify.
    OpaqueReference {
        /// Identity hint (the part before the delimiter).
        id: String,
        /// The secret part.
        secret: String,
        /// The credential exactly as presented (without scheme).
        raw: String,
    },
}

/// Key under which a successful validation is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Identity hint carried by the credential, if any.
    pub hint: Option<String>,
    /// Leading characters of the credential's secret material.
    pub prefix: String,
}

impl Credential {
    /// Parses a bearer string, stripping an optional `Bearer ` scheme.
    pub fn parse(input: &str) -> Result<Self, AuthFailure> {
        let raw = strip_scheme(input.trim());
        if raw.is_empty() {
            return Err(AuthFailure::Format("credential is empty".into()));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(AuthFailure::Format("credential contains whitespace".into()));
        }

        if raw.contains(OPAQUE_DELIMITER) {
            let mut parts = raw.split(OPAQUE_DELIMITER);
            let (id, secret) = match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(secret), None) => (id, secret),
                _ => {
                    return Err(AuthFailure::Format(
                        "opaque credential must contain exactly one delimiter".into(),
                    ));
                }
            };
            if id.is_empty() || secret.is_empty() {
                return Err(AuthFailure::Format(
                    "opaque credential has an empty id or secret".into(),
                ));
            }
            return Ok(Self::OpaqueReference {
                id: id.to_string(),
                secret: secret.to_string(),
                raw: raw.to_string(),
            });
        }

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(AuthFailure::Format(
                "structured credential must have three non-empty segments".into(),
            ));
        }
        Ok(Self::Structured {
            token: raw.to_string(),
        })
    }

    /// The credential string as presented, without scheme.
    pub fn raw(&self) -> &str {
        match self {
            Self::Structured { token } => token,
            Self::OpaqueReference { raw, .. } => raw,
        }
    }

    /// Whether this credential requires a backend round-trip.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::OpaqueReference { .. })
    }

    /// Cache key: (identity hint, prefix of the secret material).
    ///
    /// Structured tokens share their header segment, so the prefix is taken
    /// from the signature segment instead.
    pub fn cache_key(&self) -> CacheKey {
        match self {
            Self::Structured { token } => {
                let signature = token.rsplit('.').next().unwrap_or(token);
                CacheKey {
                    hint: None,
                    prefix: signature.chars().take(CREDENTIAL_PREFIX_LEN).collect(),
                }
            }
            Self::OpaqueReference { id, secret, .. } => CacheKey {
                hint: Some(id.clone()),
                prefix: secret.chars().take(CREDENTIAL_PREFIX_LEN).collect(),
            },
        }
    }
}

fn strip_scheme(input: &str) -> &str {
    match input.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => input,
    }
}
