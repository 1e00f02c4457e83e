//! Push transport tests against a local WebSocket server.
//!
//! These drive the real connect/subscribe/ack path over loopback and the
//! reconnect state machine against a refused port.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{
    Request as ServerRequest, Response as ServerResponse,
};
use tokio_tungstenite::tungstenite::Message;

use studio_notify::auth::StaticCredentialProvider;
use studio_notify::models::ConnectionStatus;
use studio_notify::transport::{PushTransport, ReconnectPolicy, TransportEvent};

fn provider(principal: &str) -> Arc<StaticCredentialProvider> {
    Arc::new(StaticCredentialProvider::with_principal(
        "tok".into(),
        principal.into(),
    ))
}

async fn next_event(
    events: &mut tokio::sync::broadcast::Receiver<TransportEvent>,
) -> TransportEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("event channel closed")
}

#[tokio::test]
async fn connects_subscribes_acks_and_delivers_pushes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        // The handshake carries the upgrade headers plus the credential
        // and tenant scope.
        let callback = |req: &ServerRequest, resp: ServerResponse| {
            assert!(req.headers().contains_key("sec-websocket-key"));
            assert_eq!(req.headers().get("authorization").unwrap(), "Bearer tok");
            assert_eq!(req.headers().get("x-tenant-id").unwrap(), "tenant-a");
            Ok(resp)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        // The subscribe frame arrives first.
        let frame = ws.next().await.unwrap().unwrap();
        let sub: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(sub["action"], "subscribe");
        assert_eq!(sub["channel"], "/user/user-1/notifications");

        ws.send(Message::Text(
            json!({
                "type": "FIX_COMPLETED",
                "title": "Fix completed",
                "message": "Clip 2 re-delivered",
                "videoId": "vid-2",
                "senderId": "editor-1",
                "recipientId": "staff-1"
            })
            .to_string(),
        ))
        .await
        .unwrap();

        // The push is acknowledged best-effort.
        let frame = ws.next().await.unwrap().unwrap();
        let ack: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(ack["action"], "ack");
        assert_eq!(ack["payload"]["subjectId"], "vid-2");
        assert_eq!(ack["payload"]["type"], "FIX_COMPLETED");

        // Hold the connection open until the client hangs up.
        while ws.next().await.is_some() {}
    });

    let transport = PushTransport::new(
        format!("ws://{}", addr),
        "tenant-a",
        provider("user-1"),
        ReconnectPolicy::default(),
    );
    let mut events = transport.subscribe();
    transport.connect().await;

    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Status(ConnectionStatus::Connecting)
    ));
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Status(ConnectionStatus::Connected { .. })
    ));
    match next_event(&mut events).await {
        TransportEvent::Push(push) => {
            assert_eq!(push.title, "Fix completed");
            assert_eq!(push.video_id.as_deref(), Some("vid-2"));
        }
        other => panic!("expected push, got {:?}", other),
    }

    assert!(transport.status().is_connected());
    transport.disconnect().await;
    assert_eq!(transport.status(), ConnectionStatus::Disconnected { attempts: 0 });
    server.await.unwrap();
}

#[tokio::test]
async fn malformed_payload_is_dropped_without_status_change() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let _ = ws.next().await; // subscribe frame

        ws.send(Message::Text("{not json".into())).await.unwrap();
        ws.send(Message::Text(
            json!({
                "type": "STATUS_CHANGED",
                "title": "Status changed",
                "message": "Video moved to review",
                "senderId": "staff-1",
                "recipientId": "editor-1"
            })
            .to_string(),
        ))
        .await
        .unwrap();

        // Only the valid payload gets acknowledged.
        let frame = ws.next().await.unwrap().unwrap();
        let ack: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(ack["payload"]["type"], "STATUS_CHANGED");

        while ws.next().await.is_some() {}
    });

    let transport = PushTransport::new(
        format!("ws://{}", addr),
        "tenant-a",
        provider("user-1"),
        ReconnectPolicy::default(),
    );
    let mut events = transport.subscribe();
    transport.connect().await;

    // Connecting, Connected, then directly the valid push; the garbage
    // frame produces no event and no status change.
    next_event(&mut events).await;
    next_event(&mut events).await;
    match next_event(&mut events).await {
        TransportEvent::Push(push) => assert_eq!(push.title, "Status changed"),
        other => panic!("expected push, got {:?}", other),
    }
    assert!(transport.status().is_connected());

    transport.disconnect().await;
    server.await.unwrap();
}

#[tokio::test]
async fn missing_principal_abandons_subscription_but_stays_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // No subscribe frame should arrive; hold the connection open.
        let _ = ws.next().await;
    });

    let transport = PushTransport::new(
        format!("ws://{}", addr),
        "tenant-a",
        provider(""),
        ReconnectPolicy::default(),
    );
    let mut events = transport.subscribe();
    transport.connect().await;

    next_event(&mut events).await; // Connecting
    next_event(&mut events).await; // Connected
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::SubscribeFailed(_)
    ));
    assert!(transport.status().is_connected());

    transport.disconnect().await;
}

#[tokio::test]
async fn refused_endpoint_exhausts_reconnect_attempts() {
    // Reserve a port, then drop the listener so connects are refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = PushTransport::new(
        format!("ws://{}", addr),
        "tenant-a",
        provider("user-1"),
        ReconnectPolicy {
            base_delay: Duration::from_millis(1),
            max_attempts: 3,
        },
    );
    let mut events = transport.subscribe();
    transport.connect().await;

    let mut last_attempts = 0;
    loop {
        match next_event(&mut events).await {
            TransportEvent::Status(ConnectionStatus::Disconnected { attempts }) => {
                assert_eq!(attempts, last_attempts + 1);
                last_attempts = attempts;
                if attempts == 3 {
                    break;
                }
            }
            TransportEvent::Status(ConnectionStatus::Connecting) => {}
            other => panic!("unexpected event {:?}", other),
        }
    }

    // Ceiling reached; the adapter stays down until an explicit connect.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.status(), ConnectionStatus::Disconnected { attempts: 3 });
    transport.disconnect().await;
}
