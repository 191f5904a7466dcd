//! Connection admission controller.
//!
//! Every admission decision runs under one lock, in this order:
//!
//! 1. record the attempt in the identity's window (always);
//! 2. more than `max_attempts_per_window` in the window ⇒ `Throttled`;
//! 3. evict the identity's stale connections, then at
//!    `max_connections_per_identity` live ones ⇒ `Duplicate`;
//! 4. at `global_max_connections` ⇒ `GlobalLimit`;
//! 5. admit.
//!
//! Rejections never create connection state; attempt windows survive them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use relay_core::config::AdmissionConfig;
use relay_core::error::AdmissionRejection;
use relay_core::events::GatewayEvent;
use relay_core::traits::recorder::EventRecorder;
use relay_core::types::id::{ConnectionId, IdentityId};
use relay_core::types::identity::Identity;

use crate::channel::registry::ChannelRegistry;
use crate::connection::handle::{ConnectionHandle, ConnectionState, Transport};
use crate::connection::pool::ConnectionPool;

use super::throttle::AttemptTracker;

/// Reason attached to connections evicted by the liveness check.
pub const STALE_REASON: &str = "connection timed out";

/// Admits, tracks, and removes connections.
#[derive(Debug)]
pub struct AdmissionController {
    /// Limits and timeouts.
    config: AdmissionConfig,
    /// The admission section: attempt windows, and the lock serializing
    /// every pool mutation.
    section: Mutex<AttemptTracker>,
    /// Admitted connections.
    pool: ConnectionPool,
    /// Subscriptions to clear when a connection goes away.
    registry: Arc<ChannelRegistry>,
    /// Observability sink.
    recorder: Arc<dyn EventRecorder>,
}

impl AdmissionController {
    /// Creates a controller.
    pub fn new(
        config: AdmissionConfig,
        registry: Arc<ChannelRegistry>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        let tracker =
            AttemptTracker::new(config.throttle_window(), config.max_attempts_per_window);
        Self {
            config,
            section: Mutex::new(tracker),
            pool: ConnectionPool::new(),
            registry,
            recorder,
        }
    }

    /// Admission limits in use.
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Tries to admit an authenticated identity on `transport`.
    pub fn try_admit(
        &self,
        identity: Identity,
        transport: Arc<Transport>,
    ) -> Result<Arc<ConnectionHandle>, AdmissionRejection> {
        self.try_admit_at(identity, transport, Utc::now())
    }

    /// Like [`try_admit`](Self::try_admit) with an explicit clock.
    pub fn try_admit_at(
        &self,
        identity: Identity,
        transport: Arc<Transport>,
        now: DateTime<Utc>,
    ) -> Result<Arc<ConnectionHandle>, AdmissionRejection> {
        let identity_id = identity.id.clone();
        let mut evicted = Vec::new();

        let outcome = {
            let mut tracker = self.section.lock();
            self.admit_locked(&mut tracker, identity, transport, now, &mut evicted)
        };

        for handle in &evicted {
            self.record_closed(handle, STALE_REASON);
        }

        match &outcome {
            Ok(handle) => {
                self.recorder.record(GatewayEvent::ConnectionAdmitted {
                    connection_id: handle.id,
                    identity_id,
                });
            }
            Err(rejection) => {
                warn!(identity_id = %identity_id, reason = rejection.code(), "{rejection}");
                self.recorder.record(GatewayEvent::ConnectionRejected {
                    identity_id,
                    reason: rejection.code().to_string(),
                });
            }
        }
        outcome
    }

    fn admit_locked(
        &self,
        tracker: &mut AttemptTracker,
        identity: Identity,
        transport: Arc<Transport>,
        now: DateTime<Utc>,
        evicted: &mut Vec<Arc<ConnectionHandle>>,
    ) -> Result<Arc<ConnectionHandle>, AdmissionRejection> {
        let window = tracker.record_at(&identity.id, now);
        if tracker.is_exceeded(&window) {
            return Err(AdmissionRejection::Throttled {
                attempts: window.count,
                retry_after: tracker.retry_after(&window),
            });
        }

        let timeout = self.config.connection_timeout();
        let mut live = Vec::new();
        for handle in self.pool.identity_connections(&identity.id) {
            if handle.is_stale_at(now, timeout) {
                self.remove_locked(&handle, STALE_REASON);
                evicted.push(handle);
            } else {
                live.push(handle);
            }
        }

        if live.len() >= self.config.max_connections_per_identity {
            if let Some(existing) = live.first() {
                return Err(AdmissionRejection::Duplicate {
                    identity_id: identity.id.clone(),
                    existing: existing.id,
                    connected_at: existing.connected_at,
                });
            }
        }

        if self.pool.connection_count() >= self.config.global_max_connections {
            return Err(AdmissionRejection::GlobalLimit {
                limit: self.config.global_max_connections,
            });
        }

        transport.advance(ConnectionState::Active);
        let handle = Arc::new(ConnectionHandle::new_at(identity, transport, now));
        self.pool.add(handle.clone());
        debug!(
            conn_id = %handle.id,
            identity_id = %handle.identity.id,
            active = self.pool.connection_count(),
            "Connection registered"
        );
        Ok(handle)
    }

    /// Closes the connection, then removes pool and registry state.
    /// Caller holds the admission lock.
    ///
    /// The connection is marked closed before its subscriptions are cleared
    /// so a concurrent subscribe cannot re-add one.
    fn remove_locked(&self, handle: &ConnectionHandle, reason: &str) {
        handle.close(reason);
        self.pool.remove(&handle.id);
        self.registry.unsubscribe_all(handle.id);
    }

    fn record_closed(&self, handle: &ConnectionHandle, reason: &str) {
        self.recorder.record(GatewayEvent::ConnectionClosed {
            connection_id: handle.id,
            identity_id: handle.identity.id.clone(),
            reason: reason.to_string(),
        });
    }

    /// Removes one connection. Returns `None` if it was already gone.
    pub fn remove(&self, conn_id: &ConnectionId, reason: &str) -> Option<Arc<ConnectionHandle>> {
        let handle = {
            let _section = self.section.lock();
            let handle = self.pool.get(conn_id)?;
            self.remove_locked(&handle, reason);
            handle
        };
        self.record_closed(&handle, reason);
        Some(handle)
    }

    /// Closes every connection of an identity, telling each client why.
    ///
    /// Bookkeeping is gone when this returns. Returns the number closed;
    /// a repeated call returns 0.
    pub fn force_disconnect(&self, identity_id: &IdentityId, reason: &str) -> usize {
        let handles = {
            let _section = self.section.lock();
            let handles = self.pool.identity_connections(identity_id);
            for handle in &handles {
                self.remove_locked(handle, reason);
            }
            handles
        };

        for handle in &handles {
            self.record_closed(handle, reason);
        }
        if !handles.is_empty() {
            info!(
                identity_id = %identity_id,
                count = handles.len(),
                reason = %reason,
                "Force-disconnected identity"
            );
        }
        handles.len()
    }

    /// Evicts every connection failing the liveness check as of `now` and
    /// prunes idle attempt windows. Returns the number of connections evicted.
    pub fn sweep_stale_at(&self, now: DateTime<Utc>) -> usize {
        let timeout = self.config.connection_timeout();
        let (stale, pruned) = {
            let mut tracker = self.section.lock();
            let stale: Vec<Arc<ConnectionHandle>> = self
                .pool
                .all_connections()
                .into_iter()
                .filter(|handle| handle.is_stale_at(now, timeout))
                .collect();
            for handle in &stale {
                self.remove_locked(handle, STALE_REASON);
            }
            (stale, tracker.prune_idle(now))
        };

        for handle in &stale {
            self.record_closed(handle, STALE_REASON);
        }
        if !stale.is_empty() || pruned > 0 {
            info!(
                evicted = stale.len(),
                windows_pruned = pruned,
                "Liveness sweep"
            );
        }
        stale.len()
    }

    /// Sweeps as of now.
    pub fn sweep_stale(&self) -> usize {
        self.sweep_stale_at(Utc::now())
    }

    /// Closes every connection.
    pub fn close_all(&self, reason: &str) -> usize {
        let handles = {
            let _section = self.section.lock();
            let handles = self.pool.all_connections();
            for handle in &handles {
                self.remove_locked(handle, reason);
            }
            handles
        };
        for handle in &handles {
            self.record_closed(handle, reason);
        }
        handles.len()
    }

    /// Looks up an admitted connection.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.pool.get(conn_id)
    }

    /// Admitted connections of an identity, oldest first.
    pub fn identity_connections(&self, identity_id: &IdentityId) -> Vec<Arc<ConnectionHandle>> {
        self.pool.identity_connections(identity_id)
    }

    /// Number of admitted connections.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Number of connected identities.
    pub fn identity_count(&self) -> usize {
        self.pool.identity_count()
    }

    /// Number of identities with an attempt window.
    pub fn tracked_identities(&self) -> usize {
        self.section.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use relay_core::traits::recorder::NoopRecorder;

    use super::*;

    fn identity(id: u64) -> Identity {
        Identity {
            id: IdentityId::from(id),
            role: "member".into(),
            permissions: vec!["receive-notifications".into()],
            display_name: format!("user-{id}"),
            email: None,
        }
    }

    fn transport() -> Arc<Transport> {
        let (transport, _rx) = Transport::new(8);
        transport.advance(ConnectionState::Authenticating);
        transport
    }

    fn controller(config: AdmissionConfig) -> AdmissionController {
        AdmissionController::new(
            config,
            Arc::new(ChannelRegistry::new()),
            Arc::new(NoopRecorder),
        )
    }

    #[test]
    fn test_duplicate_carries_existing_connection() {
        let controller = controller(AdmissionConfig::default());
        let now = Utc::now();
        let first = controller
            .try_admit_at(identity(5), transport(), now)
            .expect("first admitted");
        assert_eq!(first.state(), ConnectionState::Active);

        let err = controller
            .try_admit_at(identity(5), transport(), now + Duration::seconds(1))
            .expect_err("duplicate");
        assert_eq!(
            err,
            AdmissionRejection::Duplicate {
                identity_id: IdentityId::from(5u64),
                existing: first.id,
                connected_at: now,
            }
        );
        assert_eq!(controller.connection_count(), 1);
    }

    #[test]
    fn test_stale_connection_is_evicted_on_admission() {
        let controller = controller(AdmissionConfig::default());
        let now = Utc::now();
        let first = controller
            .try_admit_at(identity(5), transport(), now)
            .expect("first");

        let later = now + Duration::milliseconds(60_000);
        let second = controller
            .try_admit_at(identity(5), transport(), later)
            .expect("stale first is evicted");
        assert_ne!(first.id, second.id);
        assert_eq!(first.state(), ConnectionState::Closed);
        assert_eq!(controller.identity_connections(&IdentityId::from(5u64)).len(), 1);
    }

    #[test]
    fn test_global_limit() {
        let controller = controller(AdmissionConfig {
            global_max_connections: 1,
            ..AdmissionConfig::default()
        });
        let now = Utc::now();
        controller.try_admit_at(identity(1), transport(), now).expect("first");
        let err = controller
            .try_admit_at(identity(2), transport(), now)
            .expect_err("full");
        assert_eq!(err, AdmissionRejection::GlobalLimit { limit: 1 });
    }

    #[test]
    fn test_force_disconnect_is_idempotent() {
        let controller = controller(AdmissionConfig {
            max_connections_per_identity: 2,
            ..AdmissionConfig::default()
        });
        let now = Utc::now();
        controller.try_admit_at(identity(3), transport(), now).expect("a");
        controller.try_admit_at(identity(3), transport(), now).expect("b");

        assert_eq!(controller.force_disconnect(&IdentityId::from(3u64), "revoked"), 2);
        assert_eq!(controller.force_disconnect(&IdentityId::from(3u64), "revoked"), 0);
        assert_eq!(controller.connection_count(), 0);
    }

    #[test]
    fn test_sweep_evicts_disconnected_and_idle() {
        let controller = controller(AdmissionConfig {
            max_connections_per_identity: 3,
            ..AdmissionConfig::default()
        });
        let now = Utc::now();
        let gone = controller.try_admit_at(identity(1), transport(), now).expect("gone");
        let idle = controller.try_admit_at(identity(2), transport(), now).expect("idle");
        let busy = controller.try_admit_at(identity(3), transport(), now).expect("busy");

        gone.transport().mark_disconnected();
        busy.touch_at(now + Duration::seconds(50));

        assert_eq!(controller.sweep_stale_at(now + Duration::seconds(60)), 2);
        assert!(controller.get(&gone.id).is_none());
        assert!(controller.get(&idle.id).is_none());
        assert!(controller.get(&busy.id).is_some());
    }
}
