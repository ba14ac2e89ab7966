//! Live views: bridges on a set of tables feeding one sequential refresh worker.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bridge::{BridgeState, RealtimeBridge};
use crate::model::{RowFilter, Table};
use crate::notifier::ChangeNotifier;

/// A (table, filter) pair to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    pub table: Table,
    pub filter: Option<RowFilter>,
}

impl Watch {
    pub fn table(table: Table) -> Self {
        Self { table, filter: None }
    }

    pub fn filtered(table: Table, filter: RowFilter) -> Self {
        Self { table, filter: Some(filter) }
    }
}

pub struct LiveView {
    bridges: Vec<RealtimeBridge>,
    trigger: mpsc::UnboundedSender<()>,
    worker: JoinHandle<()>,
}

impl LiveView {
    /// Arms one bridge per watch. Every notification queues one call of `refresh`; calls run one
    /// after another on a single task.
    pub async fn arm<N, R, Fut>(notifier: &N, watches: Vec<Watch>, mut refresh: R) -> Self
    where
        N: ChangeNotifier + ?Sized,
        R: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (trigger, mut rx) = mpsc::unbounded_channel::<()>();
        let worker = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                refresh().await;
            }
        });

        let mut bridges = Vec::with_capacity(watches.len());
        for watch in watches {
            let tx = trigger.clone();
            let bridge = RealtimeBridge::subscribe(notifier, watch.table, watch.filter, move || {
                let _ = tx.send(());
            })
            .await;
            bridges.push(bridge);
        }

        Self { bridges, trigger, worker }
    }

    /// Queues a refresh without waiting for a change, e.g. the initial load.
    pub fn refresh_now(&self) {
        let _ = self.trigger.send(());
    }

    /// Number of bridges whose subscription succeeded.
    pub fn active_count(&self) -> usize {
        self.bridges.iter().filter(|b| b.state() == BridgeState::Active).count()
    }
}

impl Drop for LiveView {
    fn drop(&mut self) {
        for bridge in &mut self.bridges {
            bridge.unsubscribe();
        }
        self.worker.abort();
        debug!(bridges = self.bridges.len(), "live view dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeEvent, ChangeKind};
    use crate::notifier::BroadcastNotifier;
    use serde_json::Map;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn event(table: Table) -> ChangeEvent {
        ChangeEvent { table, kind: ChangeKind::Update, record: Map::new(), at: 0 }
    }

    async fn settle(count: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if count.load(Ordering::SeqCst) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn every_watched_change_refreshes_once() {
        let notifier = BroadcastNotifier::default();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        let view = LiveView::arm(
            &notifier,
            vec![Watch::table(Table::Messages), Watch::table(Table::FriendRequests)],
            move || {
                let inner = inner.clone();
                async move {
                    inner.fetch_add(1, Ordering::SeqCst);
                }
            },
        )
        .await;
        assert_eq!(view.active_count(), 2);

        view.refresh_now();
        notifier.publish(event(Table::Messages)).await.unwrap();
        notifier.publish(event(Table::FriendRequests)).await.unwrap();
        notifier.publish(event(Table::Profiles)).await.unwrap();
        settle(&count, 3).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn dropping_the_view_stops_refreshing() {
        let notifier = BroadcastNotifier::default();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        let view = LiveView::arm(&notifier, vec![Watch::table(Table::Friends)], move || {
            let inner = inner.clone();
            async move {
                inner.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await;
        drop(view);
        notifier.publish(event(Table::Friends)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
