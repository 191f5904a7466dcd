//! Integration tests for credential validation against an HTTP identity
//! backend and for structured credentials.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relay_auth::{CredentialValidator, HttpIdentityBackend, JwtEncoder};
use relay_core::config::{AuthConfig, IdentityBackendConfig};
use relay_core::error::ErrorKind;
use relay_core::traits::identity_backend::IdentityBackend;
use relay_core::traits::recorder::NoopRecorder;
use relay_core::types::id::IdentityId;
use relay_realtime::GatewaySession;
use relay_realtime::connection::Transport;

use helpers::{TEST_SECRET, TestGateway, identity, test_config};

fn auth_config(server: &MockServer, timeout_ms: u64) -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.into(),
        backend: Some(IdentityBackendConfig {
            base_url: server.uri(),
            verify_path: "/api/user".into(),
            api_key: "relay-key".into(),
            timeout_ms,
        }),
        ..AuthConfig::default()
    }
}

fn validator(server: &MockServer) -> CredentialValidator {
    CredentialValidator::from_config(&auth_config(server, 2_000), Arc::new(NoopRecorder))
        .expect("validator")
}

#[tokio::test]
async fn test_repeat_validation_uses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user"))
        .and(header("authorization", "Bearer 22|abcdef0123456789xyz"))
        .and(header("x-api-key", "relay-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": { "id": 22, "email": "jo@example.com", "role": "Member" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let validator = validator(&server);
    let first = validator
        .validate("22|abcdef0123456789xyz")
        .await
        .expect("first");
    let second = validator
        .validate("Bearer 22|abcdef0123456789xyz")
        .await
        .expect("second");

    assert_eq!(first, second);
    assert_eq!(first.id, IdentityId::new("22"));
    assert_eq!(first.role, "member");
    assert_eq!(first.permissions, vec!["receive-notifications".to_string()]);
}

#[tokio::test]
async fn test_backend_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer 1|rejected"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer 2|broken"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer 3|odd-shape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let validator = validator(&server);

    let err = validator.validate("1|rejected").await.expect_err("401");
    assert_eq!(err.code(), "CREDENTIAL_REJECTED");
    assert!(!err.is_retryable());

    let err = validator.validate("2|broken").await.expect_err("502");
    assert_eq!(err.code(), "AUTH_BACKEND_UNREACHABLE");
    assert!(err.is_retryable());

    let err = validator.validate("3|odd-shape").await.expect_err("no id");
    assert_eq!(err.code(), "AUTH_BACKEND_UNREACHABLE");
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 4 }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let validator =
        CredentialValidator::from_config(&auth_config(&server, 50), Arc::new(NoopRecorder))
            .expect("validator");
    let err = validator.validate("4|slow").await.expect_err("timeout");
    assert_eq!(err.code(), "AUTH_BACKEND_UNREACHABLE");
}

#[tokio::test]
async fn test_missing_capability_is_rejected_at_open() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "id": 6, "permissions": ["read-files"] }
        })))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.auth = auth_config(&server, 2_000);
    let backend_config = config.auth.backend.as_ref().expect("backend");
    let backend: Arc<dyn IdentityBackend> =
        Arc::new(HttpIdentityBackend::new(backend_config).expect("client"));
    let session =
        GatewaySession::with_collaborators(&config, Some(backend), None).expect("session");

    let (transport, _rx) = Transport::new(8);
    let err = session.open("6|token", transport.clone()).await.expect_err("rejected");
    assert_eq!(err.code, "INSUFFICIENT_PERMISSION");
    assert_eq!(err.kind, ErrorKind::AuthRejected);
    assert!(!transport.is_connected());
    assert_eq!(session.stats().active_connections, 0);
    assert_eq!(session.stats().metrics.auth_failures, 1);
}

#[tokio::test]
async fn test_structured_credential_opens_without_backend() {
    let gw = TestGateway::new();
    let encoder = JwtEncoder::new(&gw.config.auth);

    let token = encoder
        .issue(&identity("7", "admin"), chrono::Duration::minutes(5))
        .expect("token");
    let (handle, _rx) = gw.connect(&token).await;
    assert_eq!(handle.identity.role, "admin");
    assert_eq!(gw.backend.calls(), 0);

    let expired = encoder
        .issue(&identity("8", "member"), chrono::Duration::minutes(-5))
        .expect("token");
    assert_eq!(gw.try_connect(&expired).await.err(), Some("CREDENTIAL_EXPIRED"));

    let foreign = JwtEncoder::new(&AuthConfig {
        jwt_secret: "another-secret".into(),
        ..AuthConfig::default()
    })
    .issue(&identity("9", "member"), chrono::Duration::minutes(5))
    .expect("token");
    assert_eq!(gw.try_connect(&foreign).await.err(), Some("SIGNATURE_MISMATCH"));

    assert_eq!(gw.try_connect("not-a-credential").await.err(), Some("FORMAT_ERROR"));
}
