use serde::Serialize;
use sm_share::model::{ChangeEvent, ChangeKind, RowFilter, Table};
use sm_share::{BroadcastNotifier, ChangeNotifier, ChangeStream, MqttNotifier};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::MqttSettings;

/// Announces row changes after successful writes and hands out change streams to realtime
/// clients. Backed by the MQTT broker when enabled, else by an in-process broadcast.
#[derive(Clone)]
pub struct ChangePublisher {
    notifier: Arc<dyn ChangeNotifier>,
}

impl ChangePublisher {
    pub fn new(notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { notifier }
    }

    pub fn local() -> Self {
        Self::new(Arc::new(BroadcastNotifier::default()))
    }

    pub fn from_settings(settings: &MqttSettings) -> Self {
        if settings.enabled {
            let client_id = format!("sm-server-{}", Uuid::new_v4().simple());
            tracing::info!(host = %settings.host, port = settings.port, "change events via MQTT");
            Self::new(Arc::new(MqttNotifier::connect(settings.client_config(client_id))))
        } else {
            tracing::info!("change events in process");
            Self::local()
        }
    }

    /// Publishes a change. A failed publish is logged; the write it reports has already happened.
    pub async fn publish<T: Serialize>(&self, table: Table, kind: ChangeKind, row: &T) {
        let event = ChangeEvent::from_row(table, kind, row);
        match self.notifier.publish(event).await {
            Ok(()) => debug!(table = %table, ?kind, "change published"),
            Err(e) => warn!(table = %table, ?kind, error = %e, "failed to publish change"),
        }
    }

    pub async fn subscribe(&self, table: Table, filter: Option<RowFilter>) -> sm_share::Result<ChangeStream> {
        self.notifier.subscribe(table, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_share::Notification;

    #[tokio::test]
    async fn published_rows_reach_matching_streams() {
        let publisher = ChangePublisher::local();
        let mut stream = publisher
            .subscribe(Table::Messages, Some(RowFilter::eq("receiver_id", "u2")))
            .await
            .unwrap();

        publisher
            .publish(Table::Messages, ChangeKind::Insert, &serde_json::json!({"id": "m1", "receiver_id": "u3"}))
            .await;
        publisher
            .publish(Table::Messages, ChangeKind::Insert, &serde_json::json!({"id": "m2", "receiver_id": "u2"}))
            .await;

        match stream.next().await {
            Some(Notification::Change(event)) => {
                assert_eq!(event.record["id"], "m2");
                assert_eq!(event.kind, ChangeKind::Insert);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
