//! Entity change notification.
//!
//! `ChangeNotifier` is the seam between writers that announce row changes and readers that want
//! to refetch when they happen. `BroadcastNotifier` serves a single process, `MqttNotifier`
//! (see `crate::mqtt`) fans events out through a broker and `WsNotifier` (see `crate::ws`) reads
//! the server's realtime socket.

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{ChangeEvent, RowFilter, Table};

/// What a change stream yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Change(ChangeEvent),
    /// The subscriber fell behind and this many events were dropped.
    Lagged(u64),
}

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn publish(&self, event: ChangeEvent) -> Result<()>;

    /// Opens a stream of events on `table` whose record matches `filter`.
    async fn subscribe(&self, table: Table, filter: Option<RowFilter>) -> Result<ChangeStream>;
}

enum Source {
    Broadcast(broadcast::Receiver<ChangeEvent>),
    /// Notifications already decided by a remote end, lag included.
    Relayed(mpsc::Receiver<Notification>),
}

/// Filtered view over a feed of change events. Dropping it releases the subscription.
pub struct ChangeStream {
    table: Table,
    filter: Option<RowFilter>,
    source: Source,
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ChangeStream {
    pub fn new(table: Table, filter: Option<RowFilter>, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { table, filter, source: Source::Broadcast(rx), on_drop: None }
    }

    /// Stream fed by a relay task that forwards notifications it received elsewhere.
    pub fn relayed(table: Table, filter: Option<RowFilter>, rx: mpsc::Receiver<Notification>) -> Self {
        Self { table, filter, source: Source::Relayed(rx), on_drop: None }
    }

    /// Runs `f` once when the stream is dropped.
    pub fn with_release(mut self, f: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_drop = Some(Box::new(f));
        self
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn filter(&self) -> Option<&RowFilter> {
        self.filter.as_ref()
    }

    /// Next matching notification, or `None` once the publisher side is gone.
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            let notification = match &mut self.source {
                Source::Broadcast(rx) => match rx.recv().await {
                    Ok(event) => Notification::Change(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(table = %self.table, skipped, "change stream lagged");
                        Notification::Lagged(skipped)
                    }
                    Err(RecvError::Closed) => return None,
                },
                Source::Relayed(rx) => rx.recv().await?,
            };
            match notification {
                Notification::Change(event) if !event.matches(self.table, self.filter.as_ref()) => continue,
                other => return Some(other),
            }
        }
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(release) = self.on_drop.take() {
            release();
        }
    }
}

/// In-process notifier over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ChangeEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ChangeNotifier for BroadcastNotifier {
    async fn publish(&self, event: ChangeEvent) -> Result<()> {
        match self.tx.send(event) {
            Ok(receivers) => debug!(receivers, "change event broadcast"),
            Err(e) => debug!(table = %e.0.table, "change event dropped, no subscribers"),
        }
        Ok(())
    }

    async fn subscribe(&self, table: Table, filter: Option<RowFilter>) -> Result<ChangeStream> {
        Ok(ChangeStream::new(table, filter, self.tx.subscribe()))
    }
}
