//! A signed-in session: API client, local store and the live views that keep the store current.

use std::sync::Arc;
use tracing::{error, info};

use crate::client::ApiClient;
use crate::error::Result;
use crate::live::{LiveView, Watch};
use crate::model::{RowFilter, Table};
use crate::notifier::ChangeNotifier;
use crate::store::LocalStore;

#[derive(Clone)]
pub struct Session {
    client: Arc<ApiClient>,
    store: Arc<LocalStore>,
    user_id: String,
}

impl Session {
    pub fn new(client: Arc<ApiClient>, store: Arc<LocalStore>, user_id: impl Into<String>) -> Self {
        Self { client, store, user_id: user_id.into() }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub async fn refresh_public_messages(&self) -> Result<u64> {
        self.store.public_messages.refresh(|| self.client.public_messages()).await
    }

    pub async fn refresh_friends(&self) -> Result<u64> {
        self.store.friends.refresh(|| self.client.friends()).await
    }

    pub async fn refresh_friend_requests(&self) -> Result<u64> {
        self.store.friend_requests.refresh(|| self.client.friend_requests()).await
    }

    pub async fn refresh_recommended(&self) -> Result<u64> {
        self.store.profiles.refresh(|| self.client.recommended_profiles()).await
    }

    pub async fn refresh_user_messages(&self, user_id: &str) -> Result<u64> {
        self.store.user_messages.refresh(|| self.client.user_messages(user_id)).await
    }

    pub async fn refresh_chat(&self, friend_id: &str) -> Result<u64> {
        self.store.chat.refresh(|| self.client.chat(friend_id)).await
    }

    fn mine(&self, column: &str) -> RowFilter {
        RowFilter::eq(column, self.user_id.clone())
    }

    /// Public feed: any message, request or friendship change reloads it, since each can change a
    /// sender's status.
    pub async fn watch_public_messages<N: ChangeNotifier + ?Sized>(&self, notifier: &N) -> LiveView {
        let session = self.clone();
        let view = LiveView::arm(
            notifier,
            vec![Watch::table(Table::Messages), Watch::table(Table::FriendRequests), Watch::table(Table::Friends)],
            move || {
                let session = session.clone();
                async move {
                    if let Err(e) = session.refresh_public_messages().await {
                        error!(error = %e, "reloading public messages failed");
                    }
                }
            },
        )
        .await;
        view.refresh_now();
        view
    }

    /// Friend list. The edge can name the viewer on either side, so both columns are watched.
    pub async fn watch_friends<N: ChangeNotifier + ?Sized>(&self, notifier: &N) -> LiveView {
        let session = self.clone();
        let view = LiveView::arm(
            notifier,
            vec![
                Watch::filtered(Table::Friends, self.mine("user_id")),
                Watch::filtered(Table::Friends, self.mine("friend_id")),
                Watch::table(Table::Messages),
            ],
            move || {
                let session = session.clone();
                async move {
                    if let Err(e) = session.refresh_friends().await {
                        error!(error = %e, "reloading friends failed");
                    }
                }
            },
        )
        .await;
        view.refresh_now();
        view
    }

    /// Incoming requests.
    pub async fn watch_friend_requests<N: ChangeNotifier + ?Sized>(&self, notifier: &N) -> LiveView {
        let session = self.clone();
        let view = LiveView::arm(
            notifier,
            vec![Watch::filtered(Table::FriendRequests, self.mine("receiver_id"))],
            move || {
                let session = session.clone();
                async move {
                    if let Err(e) = session.refresh_friend_requests().await {
                        error!(error = %e, "reloading friend requests failed");
                    }
                }
            },
        )
        .await;
        view.refresh_now();
        view
    }

    pub async fn watch_recommended<N: ChangeNotifier + ?Sized>(&self, notifier: &N) -> LiveView {
        let session = self.clone();
        let view = LiveView::arm(
            notifier,
            vec![Watch::table(Table::FriendRequests), Watch::table(Table::Friends), Watch::table(Table::Profiles)],
            move || {
                let session = session.clone();
                async move {
                    if let Err(e) = session.refresh_recommended().await {
                        error!(error = %e, "reloading recommended profiles failed");
                    }
                }
            },
        )
        .await;
        view.refresh_now();
        view
    }

    /// Chat with one friend: direct messages in either direction.
    pub async fn watch_chat<N: ChangeNotifier + ?Sized>(&self, notifier: &N, friend_id: &str) -> LiveView {
        let session = self.clone();
        let friend_id = friend_id.to_string();
        let view = LiveView::arm(
            notifier,
            vec![
                Watch::filtered(Table::Messages, self.mine("receiver_id")),
                Watch::filtered(Table::Messages, self.mine("sender_id")),
            ],
            move || {
                let session = session.clone();
                let friend_id = friend_id.clone();
                async move {
                    if let Err(e) = session.refresh_chat(&friend_id).await {
                        error!(error = %e, friend_id = %friend_id, "reloading chat failed");
                    }
                }
            },
        )
        .await;
        view.refresh_now();
        view
    }

    /// Signs out and forgets everything mirrored for this user.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.client.sign_out().await;
        self.store.reset().await;
        info!(user_id = %self.user_id, "signed out");
        result
    }

    pub async fn delete_account(&self) -> Result<()> {
        self.client.delete_account(&self.user_id).await?;
        self.store.reset().await;
        info!(user_id = %self.user_id, "account deleted");
        Ok(())
    }
}
