//! Maps gateway errors to HTTP responses for rejections that happen before
//! the WebSocket upgrade.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use relay_core::error::{AdmissionRejection, AppError, ErrorKind};

/// Error body returned before upgrade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable reason code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// HTTP wrapper around [`AppError`].
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

/// Status code for a gateway error.
pub fn status_for(err: &AppError) -> StatusCode {
    match err.kind {
        ErrorKind::Format | ErrorKind::AuthRejected => StatusCode::UNAUTHORIZED,
        ErrorKind::AuthBackend => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::AdmissionRejected => match err.as_admission_rejection() {
            Some(AdmissionRejection::Throttled { .. }) => StatusCode::TOO_MANY_REQUESTS,
            Some(AdmissionRejection::Duplicate { .. }) => StatusCode::CONFLICT,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        },
        ErrorKind::AuthorizationDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Cancelled => StatusCode::BAD_REQUEST,
        ErrorKind::Configuration | ErrorKind::Serialization | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(code = self.0.code, error = %self.0.message, "Internal error");
        }

        let retry_after = match self.0.as_admission_rejection() {
            Some(AdmissionRejection::Throttled { retry_after, .. }) => {
                Some((*retry_after - Utc::now()).num_seconds().max(1))
            }
            _ => None,
        };

        let body = ErrorBody {
            code: self.0.code.to_string(),
            message: self.0.message,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use relay_core::error::AuthFailure;
    use relay_core::types::id::{ConnectionId, IdentityId};

    use super::*;

    #[test]
    fn test_rejection_statuses() {
        let cases = [
            (AppError::from(AuthFailure::Expired), StatusCode::UNAUTHORIZED),
            (
                AppError::from(AuthFailure::BackendUnreachable("down".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::from(AdmissionRejection::Throttled {
                    attempts: 6,
                    retry_after: Utc::now(),
                }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::from(AdmissionRejection::Duplicate {
                    identity_id: IdentityId::new("5"),
                    existing: ConnectionId::new(),
                    connected_at: Utc::now(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(AdmissionRejection::GlobalLimit { limit: 1 }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{}", err.code);
        }
    }

    #[test]
    fn test_throttled_response_carries_retry_after() {
        let err = AppError::from(AdmissionRejection::Throttled {
            attempts: 6,
            retry_after: Utc::now() + chrono::Duration::seconds(30),
        });
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }
}
