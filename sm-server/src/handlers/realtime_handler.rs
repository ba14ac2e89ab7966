use axum::{
    extract::{
        Extension, Path, Query,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use sm_share::model::{ChangeEvent, RowFilter, Table};
use sm_share::{ChangeStream, Notification};
use tracing::{debug, info, warn};
use crate::{
    changes::ChangePublisher,
    dto::RealtimeQuery,
    error::{ErrorCode, reject},
    middleware::auth::CurrentUser,
};

/// Parses the `{table}` segment and optional `filter` query into a subscription target.
pub fn parse_target(table: &str, query: &RealtimeQuery) -> Result<(Table, Option<RowFilter>), String> {
    let table: Table = table.parse()?;
    let filter = match query.filter.as_deref().filter(|f| !f.is_empty()) {
        Some(raw) => Some(raw.parse::<RowFilter>()?),
        None => None,
    };
    Ok((table, filter))
}

/// Frame sent for a notification: the change event itself, or `{"lagged": n}`.
pub fn frame(notification: &Notification) -> Option<String> {
    match notification {
        Notification::Change(event) => serde_json::to_string(event).ok(),
        Notification::Lagged(n) => Some(serde_json::json!({ "lagged": n }).to_string()),
    }
}

/// Whether `user_id` may see `event`. Direct messages go to their two participants only, requests
/// and friendships to their two endpoints. Profiles are readable by every signed-in user.
pub fn visible_to(event: &ChangeEvent, user_id: &str) -> bool {
    let is = |column: &str| event.record.get(column).and_then(|v| v.as_str()) == Some(user_id);
    match event.table {
        Table::Profiles => true,
        Table::Messages => match event.record.get("receiver_id") {
            None | Some(serde_json::Value::Null) => true,
            Some(_) => is("sender_id") || is("receiver_id"),
        },
        Table::FriendRequests => is("sender_id") || is("receiver_id"),
        Table::Friends => is("user_id") || is("friend_id"),
    }
}

/// `GET /api/realtime/{table}?filter=col=eq.val`: streams matching change events as JSON text
/// frames until either side closes.
pub async fn subscribe(
    ws: WebSocketUpgrade,
    Extension(changes): Extension<ChangePublisher>,
    Extension(user): Extension<CurrentUser>,
    Path(table): Path<String>,
    Query(query): Query<RealtimeQuery>,
) -> impl IntoResponse {
    let (table, filter) = match parse_target(&table, &query) {
        Ok(target) => target,
        Err(e) => return Err(reject(ErrorCode::InvalidInput, e)),
    };
    let stream = match changes.subscribe(table, filter).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(user_id = %user.id, table = %table, error = %e, "realtime subscribe failed");
            return Err(reject(ErrorCode::Internal, "Subscription failed"));
        }
    };

    info!(user_id = %user.id, table = %table, filter = ?stream.filter(), "realtime subscription opened");
    let user_id = user.id;
    Ok(ws.on_upgrade(move |socket| forward(socket, stream, user_id)))
}

async fn forward(socket: WebSocket, mut stream: ChangeStream, user_id: String) {
    let (mut sink, mut incoming) = socket.split();
    loop {
        tokio::select! {
            notification = stream.next() => {
                let Some(notification) = notification else { break };
                if let Notification::Change(event) = &notification {
                    if !visible_to(event, &user_id) {
                        continue;
                    }
                }
                let Some(text) = frame(&notification) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(user_id = %user_id, table = %stream.table(), "realtime subscription closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_share::model::{ChangeEvent, ChangeKind};

    #[test]
    fn targets_parse() {
        let query = RealtimeQuery { filter: Some("receiver_id=eq.u1".to_string()) };
        assert_eq!(
            parse_target("friend_requests", &query),
            Ok((Table::FriendRequests, Some(RowFilter::eq("receiver_id", "u1"))))
        );
        assert_eq!(parse_target("messages", &RealtimeQuery::default()), Ok((Table::Messages, None)));
        assert!(parse_target("users", &RealtimeQuery::default()).is_err());
        let bad = RealtimeQuery { filter: Some("receiver_id=gt.3".to_string()) };
        assert!(parse_target("messages", &bad).is_err());
    }

    #[test]
    fn frames_are_json() {
        let event = ChangeEvent::from_row(Table::Messages, ChangeKind::Delete, &serde_json::json!({"id": "m1"}));
        let text = frame(&Notification::Change(event)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["table"], "messages");
        assert_eq!(value["kind"], "DELETE");
        assert_eq!(value["record"]["id"], "m1");
        assert_eq!(frame(&Notification::Lagged(3)).unwrap(), r#"{"lagged":3}"#);
    }

    #[test]
    fn direct_messages_reach_only_their_participants() {
        let dm = ChangeEvent::from_row(
            Table::Messages,
            ChangeKind::Insert,
            &serde_json::json!({"id": "m1", "sender_id": "u1", "receiver_id": "u2", "content": "private to u2"}),
        );
        assert!(visible_to(&dm, "u1"));
        assert!(visible_to(&dm, "u2"));
        assert!(!visible_to(&dm, "u3"));

        let post = ChangeEvent::from_row(
            Table::Messages,
            ChangeKind::Insert,
            &serde_json::json!({"id": "m2", "sender_id": "u1", "content": "hello"}),
        );
        assert!(visible_to(&post, "u3"));
        let cleared = ChangeEvent::from_row(
            Table::Messages,
            ChangeKind::Update,
            &serde_json::json!({"id": "m3", "sender_id": "u1", "receiver_id": null}),
        );
        assert!(visible_to(&cleared, "u3"));
    }

    #[test]
    fn requests_and_friendships_reach_only_their_endpoints() {
        let request = ChangeEvent::from_row(
            Table::FriendRequests,
            ChangeKind::Insert,
            &serde_json::json!({"id": "r1", "sender_id": "u1", "receiver_id": "u2", "status": "pending"}),
        );
        let edge = ChangeEvent::from_row(
            Table::Friends,
            ChangeKind::Insert,
            &serde_json::json!({"user_id": "u1", "friend_id": "u2", "status": "accepted"}),
        );
        for event in [&request, &edge] {
            assert!(visible_to(event, "u1"));
            assert!(visible_to(event, "u2"));
            assert!(!visible_to(event, "u3"));
        }
        let profile =
            ChangeEvent::from_row(Table::Profiles, ChangeKind::Update, &serde_json::json!({"id": "u1"}));
        assert!(visible_to(&profile, "u3"));
    }

    #[tokio::test]
    async fn third_user_socket_stream_gets_nothing_from_a_direct_message() {
        let changes = ChangePublisher::local();
        let (table, filter) = parse_target("messages", &RealtimeQuery::default()).unwrap();
        let mut stream = changes.subscribe(table, filter).await.unwrap();
        let dm = serde_json::json!({"id": "m1", "sender_id": "u1", "receiver_id": "u2", "content": "private to u2"});
        changes.publish(Table::Messages, ChangeKind::Insert, &dm).await;
        changes
            .publish(Table::Messages, ChangeKind::Insert, &serde_json::json!({"id": "m2", "sender_id": "u1"}))
            .await;

        let mut delivered = Vec::new();
        for _ in 0..2 {
            match stream.next().await {
                Some(Notification::Change(event)) if visible_to(&event, "u3") => delivered.push(event),
                Some(_) => {}
                None => break,
            }
        }
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].record["id"], "m2");
    }
}
