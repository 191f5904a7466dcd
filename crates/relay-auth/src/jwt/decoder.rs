//! Structured credential verification.

use std::str::FromStr;

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use relay_core::config::AuthConfig;
use relay_core::error::{AppError, AuthFailure};

use super::claims::Claims;

/// Verifies JWT signatures against the shared secret and an algorithm allow-list.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("algorithms", &self.validation.algorithms)
            .field("leeway", &self.validation.leeway)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Result<Self, AppError> {
        let algorithms = config
            .allowed_algorithms
            .iter()
            .map(|name| parse_hmac_algorithm(name))
            .collect::<Result<Vec<_>, _>>()?;

        let first = algorithms
            .first()
            .copied()
            .ok_or_else(|| AppError::configuration("no JWT algorithm allowed"))?;

        let mut validation = Validation::new(first);
        validation.algorithms = algorithms;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = config.jwt_leeway_seconds;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        })
    }

    /// Decodes and validates a token string.
    ///
    /// Checks, in order: shape, algorithm allow-list, signature, expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthFailure> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    JwtErrorKind::ExpiredSignature => AuthFailure::Expired,
                    JwtErrorKind::InvalidSignature
                    | JwtErrorKind::InvalidAlgorithm
                    | JwtErrorKind::InvalidAlgorithmName
                    | JwtErrorKind::ImmatureSignature => AuthFailure::SignatureMismatch,
                    _ => AuthFailure::Format(format!("invalid structured credential: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }

    /// Leeway applied to the expiry claim, in seconds.
    pub fn leeway_seconds(&self) -> u64 {
        self.validation.leeway
    }
}

fn parse_hmac_algorithm(name: &str) -> Result<Algorithm, AppError> {
    let algorithm = Algorithm::from_str(name)
        .map_err(|e| AppError::configuration(format!("unknown JWT algorithm '{name}': {e}")))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(AppError::configuration(format!(
            "JWT algorithm {other:?} is not supported with a shared secret"
        ))),
    }
}
