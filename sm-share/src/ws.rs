//! Change notifier over the server's realtime websocket, `GET /api/realtime/{table}?filter=`.
//!
//! Each subscription holds its own socket. Frames are either a change event or `{"lagged": n}`.
//! A dropped socket is reopened with backoff; after a reopen the stream reports `Lagged(0)`
//! because whatever happened in between is unknown.

use async_trait::async_trait;
use futures_util::StreamExt as _;
use serde::Deserialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, Request, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::{Result, ShareError};
use crate::model::{ChangeEvent, RowFilter, Table};
use crate::notifier::{ChangeNotifier, ChangeStream, Notification};

const MAX_BACKOFF_SECS: u64 = 30;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read-only notifier backed by the server. Writes publish their own events server side, so
/// `publish` is refused.
#[derive(Clone)]
pub struct WsNotifier {
    base_url: String,
    token: String,
}

impl WsNotifier {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string(), token: token.into() }
    }

    /// Notifier for the server `client` talks to, using its current token.
    pub fn for_client(client: &ApiClient) -> Result<Self> {
        let token = client.token().ok_or(ShareError::NotSignedIn)?;
        Ok(Self::new(client.base_url(), token))
    }

    fn request(&self, table: Table, filter: Option<&RowFilter>) -> Result<Request<()>> {
        let mut request = realtime_url(&self.base_url, table, filter).into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ShareError::Validation("token is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        Ok(request)
    }
}

/// `ws(s)://host/api/realtime/{table}` for an `http(s)://host` base, with the filter query-encoded.
pub fn realtime_url(base_url: &str, table: Table, filter: Option<&RowFilter>) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    match filter {
        Some(filter) => format!("{base}/api/realtime/{table}?filter={}", urlencoding::encode(&filter.to_string())),
        None => format!("{base}/api/realtime/{table}"),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Frame {
    Lagged { lagged: u64 },
    Change(ChangeEvent),
}

/// Decodes one text frame sent by the realtime endpoint.
pub fn parse_frame(text: &str) -> Result<Notification> {
    Ok(match serde_json::from_str::<Frame>(text)? {
        Frame::Lagged { lagged } => Notification::Lagged(lagged),
        Frame::Change(event) => Notification::Change(event),
    })
}

#[async_trait]
impl ChangeNotifier for WsNotifier {
    async fn publish(&self, event: ChangeEvent) -> Result<()> {
        warn!(table = %event.table, "change events cannot be published over the realtime socket");
        Err(ShareError::Validation("the realtime socket is read-only".to_string()))
    }

    /// Opens the socket before returning, so a refused handshake is an error here and not a
    /// silently empty stream.
    async fn subscribe(&self, table: Table, filter: Option<RowFilter>) -> Result<ChangeStream> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.request(table, filter.as_ref())?).await?;
        info!(table = %table, filter = ?filter, "realtime socket connected");

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(relay(self.clone(), socket, table, filter.clone(), tx));
        let abort = task.abort_handle();
        Ok(ChangeStream::relayed(table, filter, rx).with_release(move || abort.abort()))
    }
}

async fn relay(
    notifier: WsNotifier,
    mut socket: Socket,
    table: Table,
    filter: Option<RowFilter>,
    tx: mpsc::Sender<Notification>,
) {
    let mut backoff_secs = 1;
    loop {
        if !read_frames(&mut socket, table, &tx).await {
            return;
        }
        warn!(table = %table, backoff_secs, "realtime socket closed, reconnecting");

        socket = loop {
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            if tx.is_closed() {
                return;
            }
            let request = match notifier.request(table, filter.as_ref()) {
                Ok(request) => request,
                Err(e) => {
                    warn!(table = %table, error = %e, "realtime request invalid, giving up");
                    return;
                }
            };
            match tokio_tungstenite::connect_async(request).await {
                Ok((socket, _response)) => break socket,
                Err(e) => {
                    backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
                    warn!(table = %table, error = %e, backoff_secs, "realtime reconnect failed");
                }
            }
        };
        backoff_secs = 1;
        info!(table = %table, "realtime socket reconnected");
        if tx.send(Notification::Lagged(0)).await.is_err() {
            return;
        }
    }
}

/// Forwards frames until the socket ends. `false` once nobody is listening any more.
async fn read_frames(socket: &mut Socket, table: Table, tx: &mpsc::Sender<Notification>) -> bool {
    while let Some(msg) = socket.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => match parse_frame(&text) {
                Ok(notification) => {
                    debug!(table = %table, ?notification, "realtime frame");
                    if tx.send(notification).await.is_err() {
                        return false;
                    }
                }
                Err(e) => warn!(table = %table, error = %e, "dropping malformed realtime frame"),
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(table = %table, error = %e, "realtime socket error");
                break;
            }
        }
    }
    !tx.is_closed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeKind;

    #[test]
    fn urls_follow_the_base_scheme() {
        assert_eq!(
            realtime_url("http://localhost:3000/", Table::Messages, None),
            "ws://localhost:3000/api/realtime/messages"
        );
        assert_eq!(
            realtime_url("https://sm.example.com", Table::FriendRequests, Some(&RowFilter::eq("receiver_id", "u1"))),
            "wss://sm.example.com/api/realtime/friend_requests?filter=receiver_id%3Deq.u1"
        );
    }

    #[test]
    fn frames_decode_to_notifications() {
        assert_eq!(parse_frame(r#"{"lagged":3}"#).unwrap(), Notification::Lagged(3));

        let event = ChangeEvent::from_row(Table::Friends, ChangeKind::Insert, &serde_json::json!({"user_id": "u1"}));
        let text = serde_json::to_string(&event).unwrap();
        assert_eq!(parse_frame(&text).unwrap(), Notification::Change(event));

        assert!(parse_frame(r#"{"hello":true}"#).is_err());
    }

    #[test]
    fn signed_out_client_has_no_notifier() {
        let client = ApiClient::new("http://localhost:3000").unwrap();
        assert!(matches!(WsNotifier::for_client(&client), Err(ShareError::NotSignedIn)));
        client.set_token(Some("t1".to_string()));
        assert_eq!(WsNotifier::for_client(&client).unwrap().base_url, "http://localhost:3000");
    }
}
