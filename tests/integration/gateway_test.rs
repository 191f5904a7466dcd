//! Integration tests for the gateway session: lifecycle, authorization,
//! subscriptions, and fan-out.

mod helpers;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relay_core::config::ResourceAclMode;
use relay_core::error::ErrorKind;
use relay_core::traits::resource_access::ResourceAccessCheck;
use relay_core::types::id::IdentityId;
use relay_realtime::channel::HttpResourceAccess;
use relay_realtime::message::OutboundMessage;

use helpers::{AllowList, TestGateway, drain, test_config};

#[tokio::test]
async fn test_member_lifecycle_removes_emptied_channel() {
    let gw = TestGateway::new();
    let (handle, mut rx) = gw.connect("22|member").await;

    assert!(matches!(
        drain(&mut rx).as_slice(),
        [OutboundMessage::Connected { channel, identity_id, .. }]
            if channel == "private-identity.22" && identity_id.as_str() == "22"
    ));

    gw.session
        .handle_inbound(&handle.id, r#"{"type":"subscribe","channel":"public.news"}"#)
        .await;
    assert_eq!(
        drain(&mut rx),
        vec![OutboundMessage::Subscribed {
            channel: "public.news".into()
        }]
    );
    assert_eq!(gw.session.registry().channel_subscriber_count("public.news"), 1);

    assert!(gw.session.disconnect(&handle.id, "client closed"));
    assert!(gw.session.channel_info("public.news").is_none());
    assert!(gw.session.channel_info("private-identity.22").is_none());
    assert_eq!(gw.session.stats().active_connections, 0);
}

#[tokio::test]
async fn test_unsubscribe_all_decrements_each_channel() {
    let mut config = test_config();
    config.admission.max_connections_per_identity = 2;
    let gw = TestGateway::with_config(config, None);

    let (a, _rx_a) = gw.connect("1|member").await;
    let (b, _rx_b) = gw.connect("1|member").await;
    for channel in ["public.a", "public.b", "public.c"] {
        gw.session.subscribe(&a.id, channel).await.expect("a");
    }
    gw.session.subscribe(&b.id, "public.a").await.expect("b");

    let removed = gw.session.registry().unsubscribe_all(a.id);
    assert_eq!(
        removed,
        vec![
            "private-identity.1".to_string(),
            "public.a".to_string(),
            "public.b".to_string(),
            "public.c".to_string(),
        ]
    );
    assert!(gw.session.registry().get_channels(a.id).is_empty());
    assert_eq!(gw.session.registry().channel_subscriber_count("public.a"), 1);
    assert!(gw.session.channel_info("public.b").is_none());
    assert!(gw.session.channel_info("public.c").is_none());
    assert_eq!(
        gw.session.registry().channel_subscriber_count("private-identity.1"),
        1
    );
}

#[tokio::test]
async fn test_admin_and_private_channel_rules() {
    let mut config = test_config();
    config.admission.max_connections_per_identity = 1;
    let gw = TestGateway::with_config(config, None);

    let (member, _rx1) = gw.connect("8|member").await;
    let (admin, _rx2) = gw.connect("7|admin").await;

    let err = gw
        .session
        .subscribe(&member.id, "admin.settings")
        .await
        .expect_err("member denied");
    assert_eq!(err.code, "ROLE_INSUFFICIENT");
    gw.session
        .subscribe(&admin.id, "admin.settings")
        .await
        .expect("admin allowed");

    gw.session
        .subscribe(&admin.id, "private-identity.7")
        .await
        .expect("own private channel");
    let err = gw
        .session
        .subscribe(&member.id, "private-identity.7")
        .await
        .expect_err("foreign private channel");
    assert_eq!(err.kind, ErrorKind::AuthorizationDenied);

    let err = gw
        .session
        .subscribe(&member.id, "nonsense")
        .await
        .expect_err("unknown pattern");
    assert_eq!(err.code, "UNKNOWN_CHANNEL");

    gw.session
        .subscribe(&admin.id, "moderator.queue")
        .await
        .expect("admin outranks moderator");
    assert!(gw.session.subscribe(&member.id, "moderator.queue").await.is_err());
}

#[tokio::test]
async fn test_resource_channels_consult_acl() {
    let acl: Arc<dyn ResourceAccessCheck> = Arc::new(AllowList {
        allowed: vec![("42".into(), "3".into())],
    });
    let gw = TestGateway::with_config(test_config(), Some(acl));

    let (allowed, _rx1) = gw.connect("3|member").await;
    let (other, _rx2) = gw.connect("4|member").await;

    gw.session
        .subscribe(&allowed.id, "resource.42")
        .await
        .expect("granted");
    gw.session
        .subscribe(&allowed.id, "presence-resource.42")
        .await
        .expect("presence granted");
    let err = gw
        .session
        .subscribe(&other.id, "resource.42")
        .await
        .expect_err("not on the list");
    assert_eq!(err.code, "RESOURCE_FORBIDDEN");
}

#[tokio::test]
async fn test_dot_segment_resource_ids_never_reach_the_acl() {
    let acl = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acl/resource/42/access"))
        .and(query_param("identity", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "allowed": true })))
        .expect(1)
        .mount(&acl)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "allowed": true })))
        .expect(0)
        .mount(&acl)
        .await;

    let mut config = test_config();
    config.channels.resource_acl.url = Some(format!("{}/acl", acl.uri()));
    let checker: Arc<dyn ResourceAccessCheck> =
        Arc::new(HttpResourceAccess::new(&config.channels.resource_acl).expect("acl client"));
    let gw = TestGateway::with_config(config, Some(checker));
    let (handle, mut rx) = gw.connect("3|member").await;
    drain(&mut rx);

    for channel in ["resource..", "resource...", "presence-resource.."] {
        gw.session
            .handle_inbound(
                &handle.id,
                &json!({ "type": "subscribe", "channel": channel }).to_string(),
            )
            .await;
        assert!(
            matches!(
                drain(&mut rx).as_slice(),
                [OutboundMessage::Error { code, .. }] if code == "UNKNOWN_CHANNEL"
            ),
            "{channel}"
        );
        assert!(!gw.session.registry().is_subscribed(channel, handle.id));
    }

    gw.session
        .subscribe(&handle.id, "resource.42")
        .await
        .expect("well-formed resource id is checked");
}

#[tokio::test]
async fn test_resource_channels_fail_closed_without_checker() {
    let gw = TestGateway::new();
    let (handle, _rx) = gw.connect("3|admin").await;
    let err = gw
        .session
        .subscribe(&handle.id, "resource.42")
        .await
        .expect_err("strict mode denies");
    assert_eq!(err.code, "RESOURCE_FORBIDDEN");

    let mut config = test_config();
    config.channels.resource_acl.mode = ResourceAclMode::Permissive;
    let permissive = TestGateway::with_config(config, None);
    let (handle, _rx) = permissive.connect("3|member").await;
    permissive
        .session
        .subscribe(&handle.id, "resource.42")
        .await
        .expect("permissive mode allows");
}

#[tokio::test]
async fn test_publish_reaches_every_subscriber() {
    let gw = TestGateway::new();
    let (a, mut rx_a) = gw.connect("1|member").await;
    let (b, mut rx_b) = gw.connect("2|member").await;
    let (_c, mut rx_c) = gw.connect("3|member").await;
    gw.session.subscribe(&a.id, "public.news").await.expect("a");
    gw.session.subscribe(&b.id, "public.news").await.expect("b");
    drain(&mut rx_a);
    drain(&mut rx_b);
    drain(&mut rx_c);

    let delivered = gw.session.publish("public.news", "story", json!({"id": 9}));
    assert_eq!(delivered, 2);
    for rx in [&mut rx_a, &mut rx_b] {
        match drain(rx).as_slice() {
            [OutboundMessage::Event { channel, event, data, .. }] => {
                assert_eq!(channel, "public.news");
                assert_eq!(event, "story");
                assert_eq!(data, &json!({"id": 9}));
            }
            other => panic!("unexpected frames {other:?}"),
        }
    }
    assert!(drain(&mut rx_c).is_empty());

    assert_eq!(
        gw.session
            .send_to_identity(&IdentityId::new("3"), "direct", json!(null)),
        1
    );
    assert_eq!(gw.session.stats().metrics.messages_sent, 3);
}

#[tokio::test]
async fn test_force_disconnect_notifies_and_cleans_up() {
    let mut config = test_config();
    config.admission.max_connections_per_identity = 3;
    let gw = TestGateway::with_config(config, None);

    let (first, mut rx1) = gw.connect("5|member").await;
    let (second, mut rx2) = gw.connect("5|member").await;
    gw.session.subscribe(&first.id, "public.x").await.expect("sub");
    drain(&mut rx1);
    drain(&mut rx2);

    let identity = IdentityId::new("5");
    assert_eq!(gw.session.force_disconnect(&identity, "revoked"), 2);
    assert_eq!(gw.session.force_disconnect(&identity, "revoked"), 0);

    for rx in [&mut rx1, &mut rx2] {
        assert_eq!(
            drain(rx),
            vec![OutboundMessage::Disconnected {
                reason: "revoked".into()
            }]
        );
    }
    assert!(!first.is_active());
    assert!(!second.is_active());
    assert!(gw.session.channels_for_identity(&identity).is_empty());
    assert_eq!(gw.session.registry().channel_count(), 0);

    let err = gw
        .session
        .subscribe(&first.id, "public.y")
        .await
        .expect_err("closed connection");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unsubscribe_frame() {
    let gw = TestGateway::new();
    let (handle, mut rx) = gw.connect("1|member").await;
    gw.session.subscribe(&handle.id, "public.a").await.expect("sub");
    drain(&mut rx);

    gw.session
        .handle_inbound(&handle.id, r#"{"type":"unsubscribe","channel":"public.a"}"#)
        .await;
    assert_eq!(
        drain(&mut rx),
        vec![OutboundMessage::Unsubscribed {
            channel: "public.a".into()
        }]
    );
    assert!(!gw.session.registry().is_subscribed("public.a", handle.id));
    assert_eq!(gw.session.stats().metrics.unsubscriptions_total, 1);
}
