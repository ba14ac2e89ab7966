//! Realtime refresh bridge: one change subscription whose every notification triggers a
//! caller-supplied refetch.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::model::{RowFilter, Table};
use crate::notifier::{ChangeNotifier, ChangeStream};

type Callback = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Inactive,
    Active,
}

/// Subscription handle. Dropping it unsubscribes.
pub struct RealtimeBridge {
    table: Table,
    filter: Option<RowFilter>,
    slot: Arc<Mutex<Option<Callback>>>,
    task: Option<JoinHandle<()>>,
}

fn lock(slot: &Mutex<Option<Callback>>) -> MutexGuard<'_, Option<Callback>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RealtimeBridge {
    /// Subscribes to changes on `table` (restricted by `filter`) and calls `on_any_change` once per
    /// insert, update or delete. A failed handshake is logged and leaves the bridge inactive.
    ///
    /// `on_any_change` runs on the bridge's task with the bridge lock held; it must not call back
    /// into this bridge.
    pub async fn subscribe<N, F>(notifier: &N, table: Table, filter: Option<RowFilter>, on_any_change: F) -> Self
    where
        N: ChangeNotifier + ?Sized,
        F: FnMut() + Send + 'static,
    {
        let mut bridge = Self {
            table,
            filter: filter.clone(),
            slot: Arc::new(Mutex::new(None)),
            task: None,
        };

        match notifier.subscribe(table, filter).await {
            Ok(stream) => {
                *lock(&bridge.slot) = Some(Box::new(on_any_change));
                bridge.task = Some(tokio::spawn(pump(stream, bridge.slot.clone())));
                info!(table = %bridge.table, filter = ?bridge.filter, "subscribed to changes");
            }
            Err(e) => {
                error!(table = %bridge.table, filter = ?bridge.filter, error = %e, "subscribing to changes failed");
            }
        }
        bridge
    }

    pub fn state(&self) -> BridgeState {
        if self.task.is_some() {
            BridgeState::Active
        } else {
            BridgeState::Inactive
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn filter(&self) -> Option<&RowFilter> {
        self.filter.as_ref()
    }

    /// Moves to inactive. Once this returns the callback is dropped and will not run again, even
    /// for an event already received.
    pub fn unsubscribe(&mut self) {
        lock(&self.slot).take();
        if let Some(task) = self.task.take() {
            task.abort();
            info!(table = %self.table, filter = ?self.filter, "unsubscribed from changes");
        }
    }

    /// Like `unsubscribe`, and also waits until the underlying stream has been released.
    pub async fn shutdown(mut self) {
        lock(&self.slot).take();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            info!(table = %self.table, filter = ?self.filter, "unsubscribed from changes");
        }
    }
}

impl Drop for RealtimeBridge {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn pump(mut stream: ChangeStream, slot: Arc<Mutex<Option<Callback>>>) {
    while let Some(notification) = stream.next().await {
        debug!(table = %stream.table(), ?notification, "change received");
        let mut guard = lock(&slot);
        match guard.as_mut() {
            Some(callback) => callback(),
            None => break,
        }
    }
    debug!(table = %stream.table(), "change stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ShareError};
    use crate::model::{ChangeEvent, ChangeKind};
    use crate::notifier::BroadcastNotifier;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn event(table: Table, kind: ChangeKind, user: &str) -> ChangeEvent {
        ChangeEvent {
            table,
            kind,
            record: json!({"user_id": user}).as_object().cloned().unwrap(),
            at: 0,
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn wait_for(count: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if count.load(Ordering::SeqCst) >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn fires_once_per_event_of_any_kind() {
        let notifier = BroadcastNotifier::default();
        let (count, callback) = counter();
        let bridge = RealtimeBridge::subscribe(&notifier, Table::Friends, None, callback).await;
        assert_eq!(bridge.state(), BridgeState::Active);

        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            notifier.publish(event(Table::Friends, kind, "u1")).await.unwrap();
        }
        wait_for(&count, 3).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn respects_row_filter() {
        let notifier = BroadcastNotifier::default();
        let (count, callback) = counter();
        let _bridge =
            RealtimeBridge::subscribe(&notifier, Table::Friends, Some(RowFilter::eq("user_id", "u1")), callback).await;

        notifier.publish(event(Table::Friends, ChangeKind::Insert, "u2")).await.unwrap();
        notifier.publish(event(Table::Messages, ChangeKind::Insert, "u1")).await.unwrap();
        notifier.publish(event(Table::Friends, ChangeKind::Insert, "u1")).await.unwrap();
        wait_for(&count, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_callback_after_unsubscribe_even_with_event_in_flight() {
        let notifier = BroadcastNotifier::default();
        let (count, callback) = counter();
        let mut bridge = RealtimeBridge::subscribe(&notifier, Table::Messages, None, callback).await;

        notifier.publish(event(Table::Messages, ChangeKind::Insert, "u1")).await.unwrap();
        bridge.unsubscribe();
        assert_eq!(bridge.state(), BridgeState::Inactive);

        notifier.publish(event(Table::Messages, ChangeKind::Insert, "u1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lagged_stream_fires_once_then_resumes() {
        let notifier = BroadcastNotifier::new(1);
        let (count, callback) = counter();
        let _bridge = RealtimeBridge::subscribe(&notifier, Table::Messages, None, callback).await;

        // Nothing yields on the current-thread runtime, so the pump sees two dropped events and
        // then the last one.
        for user in ["u1", "u2", "u3"] {
            notifier.publish(event(Table::Messages, ChangeKind::Insert, user)).await.unwrap();
        }
        wait_for(&count, 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        notifier.publish(event(Table::Messages, ChangeKind::Update, "u1")).await.unwrap();
        wait_for(&count, 3).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shutdown_releases_the_channel() {
        let notifier = BroadcastNotifier::default();
        let (_count, callback) = counter();
        let bridge = RealtimeBridge::subscribe(&notifier, Table::Profiles, None, callback).await;
        assert_eq!(notifier.receiver_count(), 1);
        bridge.shutdown().await;
        assert_eq!(notifier.receiver_count(), 0);
    }

    struct Unreachable;

    #[async_trait]
    impl ChangeNotifier for Unreachable {
        async fn publish(&self, _event: ChangeEvent) -> Result<()> {
            Ok(())
        }

        async fn subscribe(&self, _table: Table, _filter: Option<RowFilter>) -> Result<ChangeStream> {
            Err(ShareError::Validation("broker unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_handshake_leaves_bridge_inactive() {
        let (count, callback) = counter();
        let mut bridge = RealtimeBridge::subscribe(&Unreachable, Table::Messages, None, callback).await;
        assert_eq!(bridge.state(), BridgeState::Inactive);
        bridge.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
