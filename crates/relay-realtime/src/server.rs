//! Gateway session: owns every subsystem and drives the connection lifecycle.
//!
//! `open` admits a client and `disconnect` tears it down; in between,
//! `handle_inbound` processes its frames. `publish` fans events out to
//! subscribers.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_auth::validator::CredentialValidator;
use relay_core::config::AppConfig;
use relay_core::error::{AppError, AuthorizationDenial, ErrorKind};
use relay_core::events::{GatewayEvent, SubscriptionAction};
use relay_core::result::AppResult;
use relay_core::traits::identity_backend::IdentityBackend;
use relay_core::traits::recorder::EventRecorder;
use relay_core::traits::resource_access::ResourceAccessCheck;
use relay_core::types::id::{ConnectionId, IdentityId};

use crate::admission::controller::AdmissionController;
use crate::admission::sweeper::spawn_sweeper;
use crate::channel::authorizer::ChannelAuthorizer;
use crate::channel::channel::ChannelInfo;
use crate::channel::registry::{ChannelRegistry, SubscribeOutcome};
use crate::connection::handle::{ConnectionHandle, ConnectionState, Transport};
use crate::connection::heartbeat::{HeartbeatConfig, run_heartbeat};
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::message::validator::{parse_inbound, validate_channel_name};
use crate::metrics::{MetricsRecorder, MetricsSnapshot, messages};

/// Gateway-wide counters and sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStats {
    /// Admitted connections.
    pub active_connections: usize,
    /// Distinct connected identities.
    pub identities: usize,
    /// Channels with at least one subscriber.
    pub channels: usize,
    /// Identities with a live attempt window.
    pub tracked_identities: usize,
    /// Event counters.
    pub metrics: MetricsSnapshot,
}

/// Central gateway that coordinates validation, admission, authorization,
/// and subscriptions.
#[derive(Debug)]
pub struct GatewaySession {
    /// Credential validator.
    validator: Arc<CredentialValidator>,
    /// Admission controller and connection pool.
    admission: Arc<AdmissionController>,
    /// Channel authorizer.
    authorizer: ChannelAuthorizer,
    /// Subscription registry.
    registry: Arc<ChannelRegistry>,
    /// Metrics collector and event recorder.
    metrics: Arc<MetricsRecorder>,
    /// Per-connection heartbeat settings.
    heartbeat: HeartbeatConfig,
    /// Subscription cap per connection.
    max_subscriptions: usize,
    /// Sweep interval.
    sweep_interval: std::time::Duration,
    /// Fired on shutdown.
    shutdown: CancellationToken,
}

impl GatewaySession {
    /// Creates a gateway whose collaborators are the HTTP clients named in
    /// configuration.
    pub fn from_config(config: &AppConfig) -> Result<Arc<Self>, AppError> {
        let metrics = Arc::new(MetricsRecorder::new());
        let recorder: Arc<dyn EventRecorder> = metrics.clone();
        let validator = CredentialValidator::from_config(&config.auth, recorder)?;
        let authorizer = ChannelAuthorizer::from_config(&config.channels)?;
        Ok(Self::assemble(config, validator, authorizer, metrics))
    }

    /// Creates a gateway with explicit collaborators.
    pub fn with_collaborators(
        config: &AppConfig,
        identity_backend: Option<Arc<dyn IdentityBackend>>,
        resource_access: Option<Arc<dyn ResourceAccessCheck>>,
    ) -> Result<Arc<Self>, AppError> {
        let metrics = Arc::new(MetricsRecorder::new());
        let recorder: Arc<dyn EventRecorder> = metrics.clone();
        let validator = CredentialValidator::new(&config.auth, identity_backend, recorder)?;
        let authorizer = ChannelAuthorizer::new(&config.channels, resource_access);
        Ok(Self::assemble(config, validator, authorizer, metrics))
    }

    fn assemble(
        config: &AppConfig,
        validator: CredentialValidator,
        authorizer: ChannelAuthorizer,
        metrics: Arc<MetricsRecorder>,
    ) -> Arc<Self> {
        let registry = Arc::new(ChannelRegistry::new());
        let recorder: Arc<dyn EventRecorder> = metrics.clone();
        let admission = Arc::new(AdmissionController::new(
            config.admission.clone(),
            registry.clone(),
            recorder,
        ));

        info!(
            max_per_identity = config.admission.max_connections_per_identity,
            global_max = config.admission.global_max_connections,
            "Gateway session initialized"
        );

        Arc::new(Self {
            validator: Arc::new(validator),
            admission,
            authorizer,
            registry,
            metrics,
            heartbeat: HeartbeatConfig {
                ping_interval: config.admission.heartbeat_interval(),
                timeout: config.admission.connection_timeout(),
            },
            max_subscriptions: config.admission.max_subscriptions_per_connection,
            sweep_interval: config.admission.sweep_interval(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Authenticates and admits a client.
    ///
    /// On success the connection is active, subscribed to its private
    /// channel, and has been sent a `connected` frame. If the transport
    /// closes while validation is in flight, returns `Cancelled` and leaves
    /// no state behind.
    pub async fn open(
        &self,
        credential: &str,
        transport: Arc<Transport>,
    ) -> AppResult<Arc<ConnectionHandle>> {
        if self.shutdown.is_cancelled() {
            transport.close();
            return Err(AppError::cancelled("gateway is shutting down"));
        }

        let cancel = transport.cancellation().clone();
        let validated = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Transport closed during credential validation");
                return Err(AppError::cancelled("transport closed during validation"));
            }
            result = self.validator.validate(credential) => result,
        };

        let identity = match validated {
            Ok(identity) => identity,
            Err(failure) => {
                transport.close();
                return Err(failure.into());
            }
        };

        if !transport.advance(ConnectionState::Authenticating) {
            return Err(AppError::cancelled("transport closed before admission"));
        }

        let handle = match self.admission.try_admit(identity, transport.clone()) {
            Ok(handle) => handle,
            Err(rejection) => {
                transport.close();
                return Err(rejection.into());
            }
        };

        if cancel.is_cancelled() {
            self.admission.remove(&handle.id, "transport closed");
            return Err(AppError::cancelled("transport closed during admission"));
        }

        let private = handle.identity.private_channel();
        if self
            .registry
            .subscribe_if(&private, handle.id, || handle.is_active())
            == SubscribeOutcome::Added
        {
            self.record_subscription(handle.id, &private, SubscriptionAction::Subscribed);
        }

        handle.send(OutboundMessage::Connected {
            connection_id: handle.id,
            identity_id: handle.identity.id.clone(),
            channel: private,
        });
        tokio::spawn(run_heartbeat(handle.clone(), self.heartbeat));

        Ok(handle)
    }

    /// Processes one inbound text frame. Replies are queued on the connection.
    pub async fn handle_inbound(&self, conn_id: &ConnectionId, raw: &str) {
        let Some(handle) = self.admission.get(conn_id) else {
            warn!(conn_id = %conn_id, "Message from unknown connection");
            return;
        };

        handle.touch();
        messages::record_received(self.metrics.metrics());

        let msg = match parse_inbound(raw) {
            Ok(msg) => msg,
            Err(reason) => {
                self.reply(&handle, OutboundMessage::error("INVALID_MESSAGE", reason));
                return;
            }
        };

        match msg {
            InboundMessage::Subscribe { channel } => {
                let reply = match self.subscribe(conn_id, &channel).await {
                    Ok(_) => OutboundMessage::Subscribed { channel },
                    Err(e) => OutboundMessage::error(e.code, e.message),
                };
                self.reply(&handle, reply);
            }
            InboundMessage::Unsubscribe { channel } => {
                let reply = match self.unsubscribe(conn_id, &channel) {
                    Ok(_) => OutboundMessage::Unsubscribed { channel },
                    Err(e) => OutboundMessage::error(e.code, e.message),
                };
                self.reply(&handle, reply);
            }
            InboundMessage::Pong { .. } => {}
            InboundMessage::Ping { timestamp } => {
                let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
                self.reply(&handle, OutboundMessage::Pong { timestamp });
            }
        }
    }

    fn reply(&self, handle: &ConnectionHandle, msg: OutboundMessage) {
        if handle.send(msg) {
            messages::record_sent(self.metrics.metrics(), 1);
        }
    }

    fn active_handle(&self, conn_id: &ConnectionId) -> AppResult<Arc<ConnectionHandle>> {
        self.admission
            .get(conn_id)
            .filter(|handle| handle.is_active())
            .ok_or_else(|| AppError::not_found(format!("connection {conn_id} is not active")))
    }

    /// Subscribes a connection to a channel after authorization.
    ///
    /// Repeating a subscription is a no-op success. Malformed names are
    /// denied as unknown channels.
    pub async fn subscribe(
        &self,
        conn_id: &ConnectionId,
        channel: &str,
    ) -> AppResult<SubscribeOutcome> {
        if let Err(reason) = validate_channel_name(channel) {
            debug!(
                conn_id = %conn_id,
                channel = %channel,
                reason = %reason,
                "Malformed channel name"
            );
            return Err(AuthorizationDenial::UnknownChannel(channel.to_string()).into());
        }
        let handle = self.active_handle(conn_id)?;
        if self.registry.is_subscribed(channel, handle.id) {
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }
        if self.registry.subscription_count(handle.id) >= self.max_subscriptions {
            return Err(AppError::new(
                ErrorKind::AuthorizationDenied,
                "MAX_SUBSCRIPTIONS",
                format!("maximum subscriptions ({}) reached", self.max_subscriptions),
            ));
        }

        if let Err(denial) = self.authorizer.decide(&handle.identity, channel).await {
            self.record_subscription(handle.id, channel, SubscriptionAction::Denied);
            return Err(denial.into());
        }

        match self
            .registry
            .subscribe_if(channel, handle.id, || handle.is_active())
        {
            SubscribeOutcome::Rejected => {
                debug!(
                    conn_id = %handle.id,
                    channel = %channel,
                    "Connection closed during authorization"
                );
                Err(AppError::cancelled("connection closed during authorization"))
            }
            SubscribeOutcome::Added => {
                self.record_subscription(handle.id, channel, SubscriptionAction::Subscribed);
                Ok(SubscribeOutcome::Added)
            }
            SubscribeOutcome::AlreadySubscribed => Ok(SubscribeOutcome::AlreadySubscribed),
        }
    }

    /// Removes a connection from a channel. Returns whether it was subscribed.
    pub fn unsubscribe(&self, conn_id: &ConnectionId, channel: &str) -> AppResult<bool> {
        let handle = self.active_handle(conn_id)?;
        let removed = self.registry.unsubscribe(channel, handle.id);
        if removed {
            self.record_subscription(handle.id, channel, SubscriptionAction::Unsubscribed);
        }
        Ok(removed)
    }

    fn record_subscription(
        &self,
        conn_id: ConnectionId,
        channel: &str,
        action: SubscriptionAction,
    ) {
        self.metrics.record(GatewayEvent::SubscriptionChanged {
            connection_id: conn_id,
            channel: channel.to_string(),
            action,
        });
    }

    /// Tears down one connection. Returns `false` if it was already gone.
    pub fn disconnect(&self, conn_id: &ConnectionId, reason: &str) -> bool {
        self.admission.remove(conn_id, reason).is_some()
    }

    /// Closes every connection of an identity. Returns the number closed.
    pub fn force_disconnect(&self, identity_id: &IdentityId, reason: &str) -> usize {
        self.admission.force_disconnect(identity_id, reason)
    }

    /// Forgets a cached credential so its next use is re-validated.
    pub async fn invalidate_credential(&self, credential: &str) {
        self.validator.invalidate(credential).await;
    }

    /// Sends an event to every active subscriber of `channel`.
    /// Returns the number of connections it was queued for.
    pub fn publish(&self, channel: &str, event: &str, data: serde_json::Value) -> usize {
        let subscribers = self.registry.get_subscribers(channel);
        if subscribers.is_empty() {
            return 0;
        }

        let frame = OutboundMessage::Event {
            channel: channel.to_string(),
            event: event.to_string(),
            data,
            timestamp: Utc::now(),
        };

        let delivered = subscribers
            .iter()
            .filter_map(|conn_id| self.admission.get(conn_id))
            .filter(|handle| handle.is_active() && handle.send(frame.clone()))
            .count();

        self.registry.touch(channel);
        messages::record_sent(self.metrics.metrics(), delivered as u64);
        debug!(channel = %channel, event = %event, delivered, "Published event");
        delivered
    }

    /// Sends an event to an identity's private channel.
    pub fn send_to_identity(
        &self,
        identity_id: &IdentityId,
        event: &str,
        data: serde_json::Value,
    ) -> usize {
        self.publish(&format!("private-identity.{identity_id}"), event, data)
    }

    /// Channels subscribed by any connection of the identity, sorted.
    pub fn channels_for_identity(&self, identity_id: &IdentityId) -> Vec<String> {
        self.admission
            .identity_connections(identity_id)
            .iter()
            .flat_map(|handle| self.registry.get_channels(handle.id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Metadata for one channel.
    pub fn channel_info(&self, channel: &str) -> Option<ChannelInfo> {
        self.registry.channel_info(channel)
    }

    /// Metadata for every channel.
    pub fn list_channels(&self) -> Vec<ChannelInfo> {
        self.registry.list_channels()
    }

    /// Gateway-wide counters.
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            active_connections: self.admission.connection_count(),
            identities: self.admission.identity_count(),
            channels: self.registry.channel_count(),
            tracked_identities: self.admission.tracked_identities(),
            metrics: self.metrics.snapshot(),
        }
    }

    /// Starts the liveness sweeper. It stops on [`shutdown`](Self::shutdown).
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        vec![spawn_sweeper(
            self.admission.clone(),
            self.sweep_interval,
            self.shutdown.child_token(),
        )]
    }

    /// Stops background tasks and closes every connection with reason `shutdown`.
    pub fn shutdown(&self) -> usize {
        info!("Shutting down gateway");
        self.shutdown.cancel();
        let closed = self.admission.close_all("shutdown");
        info!(closed, "Gateway shut down");
        closed
    }

    /// Token fired on shutdown.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Credential validator.
    pub fn validator(&self) -> &CredentialValidator {
        &self.validator
    }

    /// Admission controller.
    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Subscription registry.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Channel authorizer.
    pub fn authorizer(&self) -> &ChannelAuthorizer {
        &self.authorizer
    }

    /// Metrics recorder.
    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }
}
