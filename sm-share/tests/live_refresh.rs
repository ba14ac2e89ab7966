//! Store refresh driven by change notifications, without a server.

use std::sync::Arc;
use std::time::Duration;

use sm_share::model::{ChangeEvent, ChangeKind, Profile, RowFilter, Table};
use sm_share::{BroadcastNotifier, ChangeNotifier, LiveView, LocalStore, Watch};

fn profile(id: &str) -> Profile {
    Profile {
        id: id.to_string(),
        nickname: Some(id.to_uppercase()),
        email: format!("{id}@example.com"),
        avatar_url: None,
        created_at: 0,
        updated_at: 0,
    }
}

fn request_for(receiver: &str) -> ChangeEvent {
    let row = serde_json::json!({"sender_id": "u9", "receiver_id": receiver, "status": "pending"});
    ChangeEvent::from_row(Table::FriendRequests, ChangeKind::Insert, &row)
}

async fn wait_for_version(store: &LocalStore, version: u64) {
    for _ in 0..100 {
        if store.profiles.version().await >= version {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn change_triggers_full_reload() {
    let notifier = BroadcastNotifier::default();
    let store = Arc::new(LocalStore::new());
    let backend = Arc::new(tokio::sync::Mutex::new(vec![profile("u2")]));

    let view = {
        let store = store.clone();
        let backend = backend.clone();
        LiveView::arm(
            &notifier,
            vec![Watch::filtered(Table::FriendRequests, RowFilter::eq("receiver_id", "u1"))],
            move || {
                let store = store.clone();
                let backend = backend.clone();
                async move {
                    let _ = store
                        .profiles
                        .refresh(|| async { Ok::<_, String>(backend.lock().await.clone()) })
                        .await;
                }
            },
        )
        .await
    };

    view.refresh_now();
    wait_for_version(&store, 1).await;
    assert_eq!(store.profiles.items().await, vec![profile("u2")]);

    backend.lock().await.push(profile("u3"));
    notifier.publish(request_for("someone-else")).await.unwrap();
    notifier.publish(request_for("u1")).await.unwrap();
    wait_for_version(&store, 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.profiles.version().await, 2);
    assert_eq!(store.profiles.len().await, 2);

    drop(view);
    notifier.publish(request_for("u1")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.profiles.version().await, 2);
}
