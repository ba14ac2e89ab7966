//! Typed local mirror of server state. Every collection is replaced wholesale by its `refresh`
//! entry point; nothing here is authoritative.

use std::future::Future;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::model::{FriendRequestWithSender, FriendSummary, Message, MessageWithStatus, Profile};

#[derive(Debug, Clone)]
struct Snapshot<T> {
    items: Vec<T>,
    version: u64,
}

/// One mirrored collection.
#[derive(Debug)]
pub struct Collection<T> {
    name: &'static str,
    inner: RwLock<Snapshot<T>>,
}

impl<T: Clone> Collection<T> {
    pub fn new(name: &'static str) -> Self {
        Self { name, inner: RwLock::new(Snapshot { items: Vec::new(), version: 0 }) }
    }

    /// Fetches and replaces the content. On error the previous content is kept and the error is
    /// returned to the caller. Returns the new version.
    pub async fn refresh<F, Fut, E>(&self, fetch: F) -> Result<u64, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
        E: std::fmt::Display,
    {
        match fetch().await {
            Ok(items) => Ok(self.replace(items).await),
            Err(e) => {
                warn!(collection = self.name, error = %e, "refresh failed, keeping previous content");
                Err(e)
            }
        }
    }

    pub async fn replace(&self, items: Vec<T>) -> u64 {
        let mut snapshot = self.inner.write().await;
        snapshot.version += 1;
        debug!(collection = self.name, count = items.len(), version = snapshot.version, "collection replaced");
        snapshot.items = items;
        snapshot.version
    }

    pub async fn clear(&self) {
        self.replace(Vec::new()).await;
    }

    pub async fn items(&self) -> Vec<T> {
        self.inner.read().await.items.clone()
    }

    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.items.is_empty()
    }

    pub async fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.inner.read().await.items.iter().find(|item| pred(item)).cloned()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Everything a signed-in session mirrors.
#[derive(Debug)]
pub struct LocalStore {
    pub profiles: Collection<Profile>,
    pub public_messages: Collection<MessageWithStatus>,
    pub user_messages: Collection<Message>,
    pub friends: Collection<FriendSummary>,
    pub friend_requests: Collection<FriendRequestWithSender>,
    pub chat: Collection<Message>,
    selected_message: RwLock<Option<Message>>,
    selected_friend: RwLock<Option<Profile>>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            profiles: Collection::new("profiles"),
            public_messages: Collection::new("public_messages"),
            user_messages: Collection::new("user_messages"),
            friends: Collection::new("friends"),
            friend_requests: Collection::new("friend_requests"),
            chat: Collection::new("chat"),
            selected_message: RwLock::new(None),
            selected_friend: RwLock::new(None),
        }
    }

    /// The message being edited, if any.
    pub async fn selected_message(&self) -> Option<Message> {
        self.selected_message.read().await.clone()
    }

    pub async fn select_message(&self, message: Option<Message>) {
        *self.selected_message.write().await = message;
    }

    pub async fn selected_friend(&self) -> Option<Profile> {
        self.selected_friend.read().await.clone()
    }

    pub async fn select_friend(&self, friend: Option<Profile>) {
        *self.selected_friend.write().await = friend;
    }

    /// Forgets everything, e.g. on sign-out.
    pub async fn reset(&self) {
        self.profiles.clear().await;
        self.public_messages.clear().await;
        self.user_messages.clear().await;
        self.friends.clear().await;
        self.friend_requests.clear().await;
        self.chat.clear().await;
        self.select_message(None).await;
        self.select_friend(None).await;
    }
}
