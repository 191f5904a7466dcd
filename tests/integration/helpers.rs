//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use relay_core::config::AppConfig;
use relay_core::result::AppResult;
use relay_core::traits::identity_backend::{BackendError, BackendIdentity, IdentityBackend};
use relay_core::traits::resource_access::ResourceAccessCheck;
use relay_core::types::id::IdentityId;
use relay_core::types::identity::Identity;
use relay_realtime::connection::{ConnectionHandle, Transport};
use relay_realtime::message::OutboundMessage;
use relay_realtime::GatewaySession;

/// Shared secret for structured credentials in tests.
pub const TEST_SECRET: &str = "integration-secret";

/// Identity backend that accepts `<id>|<role>` credentials.
#[derive(Debug, Default)]
pub struct StubBackend {
    calls: AtomicUsize,
}

impl StubBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityBackend for StubBackend {
    async fn verify(&self, credential: &str) -> Result<BackendIdentity, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (id, role) = credential
            .split_once('|')
            .ok_or(BackendError::Rejected { status: 401 })?;
        Ok(BackendIdentity {
            id: IdentityId::new(id),
            email: None,
            role: Some(role.to_string()),
            permissions: None,
            display_name: None,
        })
    }
}

/// Resource ACL that allows only the listed `(resource_id, identity_id)` pairs.
#[derive(Debug, Default)]
pub struct AllowList {
    pub allowed: Vec<(String, String)>,
}

#[async_trait]
impl ResourceAccessCheck for AllowList {
    async fn check(
        &self,
        _resource_type: &str,
        resource_id: &str,
        identity_id: &IdentityId,
    ) -> AppResult<bool> {
        Ok(self
            .allowed
            .iter()
            .any(|(res, id)| res == resource_id && id == identity_id.as_str()))
    }
}

/// Baseline test configuration.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = TEST_SECRET.into();
    config
}

/// A gateway wired to in-process collaborators.
pub struct TestGateway {
    pub session: Arc<GatewaySession>,
    pub backend: Arc<StubBackend>,
    pub config: AppConfig,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_config(test_config(), None)
    }

    pub fn with_config(config: AppConfig, acl: Option<Arc<dyn ResourceAccessCheck>>) -> Self {
        let backend = Arc::new(StubBackend::default());
        let identity_backend: Arc<dyn IdentityBackend> = backend.clone();
        let session = GatewaySession::with_collaborators(&config, Some(identity_backend), acl)
            .expect("gateway");
        Self {
            session,
            backend,
            config,
        }
    }

    /// Opens a connection, expecting success.
    pub async fn connect(
        &self,
        credential: &str,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>) {
        let (transport, rx) = Transport::new(64);
        let handle = self
            .session
            .open(credential, transport)
            .await
            .expect("connection admitted");
        (handle, rx)
    }

    /// Opens a connection, returning the error code on failure.
    pub async fn try_connect(
        &self,
        credential: &str,
    ) -> Result<(Arc<ConnectionHandle>, mpsc::Receiver<OutboundMessage>), &'static str> {
        let (transport, rx) = Transport::new(64);
        self.session
            .open(credential, transport)
            .await
            .map(|handle| (handle, rx))
            .map_err(|e| e.code)
    }
}

/// Drains every queued frame.
pub fn drain(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

/// An identity with the notification capability.
pub fn identity(id: &str, role: &str) -> Identity {
    Identity {
        id: IdentityId::new(id),
        role: role.into(),
        permissions: vec!["receive-notifications".into()],
        display_name: format!("user-{id}"),
        email: None,
    }
}
