//! Integration tests for connection admission: duplicates, throttling,
//! global capacity, and liveness.

mod helpers;

use std::sync::Arc;

use chrono::{Duration, Utc};

use relay_core::config::AdmissionConfig;
use relay_core::error::AdmissionRejection;
use relay_core::traits::recorder::NoopRecorder;
use relay_core::types::id::IdentityId;
use relay_realtime::AdmissionController;
use relay_realtime::channel::ChannelRegistry;
use relay_realtime::connection::Transport;
use relay_realtime::message::OutboundMessage;

use helpers::{TestGateway, drain, identity, test_config};

fn controller(config: AdmissionConfig) -> (AdmissionController, Arc<ChannelRegistry>) {
    let registry = Arc::new(ChannelRegistry::new());
    let controller = AdmissionController::new(config, registry.clone(), Arc::new(NoopRecorder));
    (controller, registry)
}

fn transport() -> Arc<Transport> {
    let (transport, _rx) = Transport::new(8);
    transport
}

#[tokio::test]
async fn test_second_connection_is_duplicate() {
    let gw = TestGateway::new();
    let (first, _rx) = gw.connect("5|member").await;

    let code = gw.try_connect("5|member").await.err();
    assert_eq!(code, Some("DUPLICATE_CONNECTION"));

    let live = gw.session.admission().identity_connections(&IdentityId::new("5"));
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, first.id);
    assert!(first.is_active());
}

#[tokio::test]
async fn test_sixth_rapid_attempt_is_throttled_before_duplicate_check() {
    let gw = TestGateway::new();
    let mut codes = Vec::new();
    let mut kept = Vec::new();
    for _ in 0..6 {
        match gw.try_connect("9|member").await {
            Ok(conn) => {
                codes.push("ADMITTED");
                kept.push(conn);
            }
            Err(code) => codes.push(code),
        }
    }

    assert_eq!(
        codes,
        vec![
            "ADMITTED",
            "DUPLICATE_CONNECTION",
            "DUPLICATE_CONNECTION",
            "DUPLICATE_CONNECTION",
            "DUPLICATE_CONNECTION",
            "THROTTLED",
        ]
    );
    assert_eq!(gw.backend.calls(), 1, "later attempts were served from cache");
    let metrics = gw.session.stats().metrics;
    assert_eq!(metrics.rejected_duplicate, 4);
    assert_eq!(metrics.rejected_throttled, 1);
}

#[test]
fn test_throttle_window_resets() {
    let config = AdmissionConfig {
        max_connections_per_identity: 10,
        ..AdmissionConfig::default()
    };
    let window = config.throttle_window();
    let (controller, _) = controller(config);
    let start = Utc::now();
    let who = identity("9", "member");

    for attempt in 0..5 {
        let at = start + Duration::milliseconds(attempt);
        controller
            .try_admit_at(who.clone(), transport(), at)
            .expect("within limit");
    }
    let rejection = controller
        .try_admit_at(who.clone(), transport(), start + Duration::milliseconds(10))
        .expect_err("sixth attempt");
    assert!(matches!(rejection, AdmissionRejection::Throttled { attempts: 6, .. }));

    let later = start + window + Duration::milliseconds(1);
    controller
        .try_admit_at(who, transport(), later)
        .expect("new window");
}

#[test]
fn test_global_limit_rejects_new_identities() {
    let config = AdmissionConfig {
        global_max_connections: 2,
        ..AdmissionConfig::default()
    };
    let (controller, _) = controller(config);
    let now = Utc::now();

    controller.try_admit_at(identity("1", "member"), transport(), now).expect("1");
    controller.try_admit_at(identity("2", "member"), transport(), now).expect("2");
    let rejection = controller
        .try_admit_at(identity("3", "member"), transport(), now)
        .expect_err("full");
    assert_eq!(rejection, AdmissionRejection::GlobalLimit { limit: 2 });
    assert_eq!(controller.connection_count(), 2);
}

#[test]
fn test_stale_connection_is_replaced() {
    let config = AdmissionConfig::default();
    let timeout = config.connection_timeout();
    let (controller, registry) = controller(config);
    let start = Utc::now();

    let (old_transport, mut old_rx) = Transport::new(8);
    let old = controller
        .try_admit_at(identity("5", "member"), old_transport, start)
        .expect("first");
    registry.subscribe("public.a", old.id);

    let fresh = controller
        .try_admit_at(identity("5", "member"), transport(), start + timeout)
        .expect("stale connection evicted");

    assert_ne!(fresh.id, old.id);
    assert!(!old.is_active());
    assert!(registry.get_channels(old.id).is_empty());
    assert!(matches!(
        drain(&mut old_rx).as_slice(),
        [OutboundMessage::Disconnected { .. }]
    ));
}

#[test]
fn test_sweep_evicts_only_stale_connections() {
    let config = AdmissionConfig::default();
    let timeout = config.connection_timeout();
    let (controller, _) = controller(config);
    let start = Utc::now();

    let idle = controller
        .try_admit_at(identity("1", "member"), transport(), start)
        .expect("idle");
    let busy = controller
        .try_admit_at(identity("2", "member"), transport(), start)
        .expect("busy");
    busy.touch_at(start + timeout);

    let gone = controller
        .try_admit_at(identity("3", "member"), transport(), start)
        .expect("gone");
    gone.transport().mark_disconnected();

    let evicted = controller.sweep_stale_at(start + timeout + Duration::milliseconds(1));
    assert_eq!(evicted, 2);
    assert!(controller.get(&idle.id).is_none());
    assert!(controller.get(&gone.id).is_none());
    assert!(controller.get(&busy.id).is_some());
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let gw = TestGateway::new();
    let (first, _rx) = gw.connect("5|member").await;
    gw.session.disconnect(&first.id, "client closed");

    let (second, _rx2) = gw.connect("5|member").await;
    assert_ne!(first.id, second.id);
    assert_eq!(gw.session.stats().active_connections, 1);
}

#[tokio::test]
async fn test_shutdown_closes_all_connections() {
    let mut config = test_config();
    config.admission.max_connections_per_identity = 2;
    let gw = helpers::TestGateway::with_config(config, None);
    let (_a, mut rx_a) = gw.connect("1|member").await;
    let (_b, mut rx_b) = gw.connect("2|member").await;
    drain(&mut rx_a);
    drain(&mut rx_b);

    let tasks = gw.session.spawn_background_tasks();
    assert_eq!(gw.session.shutdown(), 2);
    for task in tasks {
        task.await.expect("sweeper stops");
    }
    for rx in [&mut rx_a, &mut rx_b] {
        assert_eq!(
            drain(rx),
            vec![OutboundMessage::Disconnected {
                reason: "shutdown".into()
            }]
        );
    }
    assert_eq!(gw.session.stats().active_connections, 0);
}
