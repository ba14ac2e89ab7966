//! `WsNotifier` against a local axum realtime endpoint.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use sm_share::model::{ChangeEvent, ChangeKind, RowFilter, Table};
use sm_share::{BridgeState, ChangeNotifier, Notification, RealtimeBridge, ShareError, WsNotifier};

#[derive(Clone, Default)]
struct Endpoint {
    opened: Arc<Mutex<Vec<(String, Option<String>)>>>,
    closed: Arc<AtomicUsize>,
}

async fn realtime(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    State(endpoint): State<Endpoint>,
) -> Response {
    if headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some("Bearer t1") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    endpoint.opened.lock().unwrap().push((table.clone(), query.get("filter").cloned()));
    ws.on_upgrade(move |socket| feed(socket, table, endpoint)).into_response()
}

async fn feed(mut socket: WebSocket, table: String, endpoint: Endpoint) {
    let event = serde_json::json!({
        "table": table,
        "kind": "INSERT",
        "record": {"sender_id": "u2", "receiver_id": "u1"},
        "at": 1,
    });
    let _ = socket.send(Message::Text(event.to_string().into())).await;
    let _ = socket.send(Message::Text(r#"{"lagged":4}"#.into())).await;
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
    endpoint.closed.fetch_add(1, Ordering::SeqCst);
}

async fn serve(endpoint: Endpoint) -> String {
    let app = Router::new().route("/api/realtime/{table}", get(realtime)).with_state(endpoint);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

async fn wait_for(count: &AtomicUsize, expected: usize) {
    for _ in 0..200 {
        if count.load(Ordering::SeqCst) >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn relays_changes_and_server_lag() {
    let endpoint = Endpoint::default();
    let base = serve(endpoint.clone()).await;
    let notifier = WsNotifier::new(base, "t1");

    let mut stream = notifier
        .subscribe(Table::FriendRequests, Some(RowFilter::eq("receiver_id", "u1")))
        .await
        .unwrap();

    match stream.next().await {
        Some(Notification::Change(event)) => {
            assert_eq!(event.table, Table::FriendRequests);
            assert_eq!(event.kind, ChangeKind::Insert);
            assert_eq!(event.record["receiver_id"], "u1");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(stream.next().await, Some(Notification::Lagged(4)));
    assert_eq!(
        *endpoint.opened.lock().unwrap(),
        vec![("friend_requests".to_string(), Some("receiver_id=eq.u1".to_string()))]
    );
}

#[tokio::test]
async fn frames_for_other_rows_are_filtered_client_side() {
    let base = serve(Endpoint::default()).await;
    let notifier = WsNotifier::new(base, "t1");

    let mut stream = notifier
        .subscribe(Table::FriendRequests, Some(RowFilter::eq("receiver_id", "u7")))
        .await
        .unwrap();
    assert_eq!(stream.next().await, Some(Notification::Lagged(4)));
}

#[tokio::test]
async fn refused_token_fails_the_subscription() {
    let endpoint = Endpoint::default();
    let base = serve(endpoint.clone()).await;
    let notifier = WsNotifier::new(base, "stale");

    let result = notifier.subscribe(Table::Messages, None).await;
    assert!(matches!(result, Err(ShareError::WebSocket(_))));
    assert!(endpoint.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn bridge_fires_once_per_frame() {
    let base = serve(Endpoint::default()).await;
    let notifier = WsNotifier::new(base, "t1");
    let count = Arc::new(AtomicUsize::new(0));
    let inner = count.clone();

    let bridge = RealtimeBridge::subscribe(&notifier, Table::Messages, None, move || {
        inner.fetch_add(1, Ordering::SeqCst);
    })
    .await;
    assert_eq!(bridge.state(), BridgeState::Active);

    wait_for(&count, 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropping_the_stream_closes_the_socket() {
    let endpoint = Endpoint::default();
    let base = serve(endpoint.clone()).await;
    let notifier = WsNotifier::new(base, "t1");

    let stream = notifier.subscribe(Table::Profiles, None).await.unwrap();
    drop(stream);
    wait_for(&endpoint.closed, 1).await;
    assert_eq!(endpoint.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn publishing_is_refused() {
    let notifier = WsNotifier::new("http://127.0.0.1:9", "t1");
    let event = ChangeEvent::from_row(Table::Messages, ChangeKind::Insert, &serde_json::json!({"id": "m1"}));
    assert!(notifier.publish(event).await.is_err());
}
