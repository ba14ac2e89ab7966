use crate::error::{ErrorCode, Result, db_error};
use crate::service::FriendService;
use sm_share::model::{Message, MessageWithStatus};
use sm_share::{classify, now_timestamp};
use sqlx::MySqlPool;
use tracing::info;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, sender_id, content, image_url, receiver_id, created_at, updated_at";

pub const NOT_FRIENDS_MESSAGE: &str = "You must be friends with this user to view their secret messages.";

pub struct MessageService {
    pool: MySqlPool,
}

impl MessageService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn friends(&self) -> FriendService {
        FriendService::new(self.pool.clone())
    }

    /// All public messages, newest first, each with the viewer's status toward its sender.
    pub async fn list_public(&self, viewer: &str) -> Result<Vec<MessageWithStatus>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE receiver_id IS NULL ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let friends = self.friends();
        let friendships = friends.friendships_of(viewer).await?;
        let requests = friends.pending_involving(viewer).await?;
        Ok(classify(viewer, &messages, &friendships, &requests))
    }

    /// Public messages of `user_id`, newest first. `Forbidden` unless the viewer is that user or
    /// one of their friends.
    pub async fn list_by_user(&self, viewer: &str, user_id: &str) -> Result<Vec<Message>> {
        if viewer != user_id && !self.friends().are_friends(viewer, user_id).await? {
            return Err(ErrorCode::Forbidden);
        }
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE sender_id = ? AND receiver_id IS NULL
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    /// Direct messages between the viewer and a friend in both directions, oldest first.
    pub async fn chat(&self, viewer: &str, friend_id: &str) -> Result<Vec<Message>> {
        if !self.friends().are_friends(viewer, friend_id).await? {
            return Err(ErrorCode::Forbidden);
        }
        sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at ASC"
        ))
        .bind(viewer)
        .bind(friend_id)
        .bind(friend_id)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    /// Stores a message. `content` must already be normalized. Direct messages need a friend as
    /// receiver, else `Forbidden`.
    pub async fn post(
        &self,
        sender: &str,
        content: String,
        image_url: Option<String>,
        receiver_id: Option<String>,
    ) -> Result<Message> {
        if let Some(receiver) = receiver_id.as_deref() {
            if receiver == sender || !self.friends().are_friends(sender, receiver).await? {
                return Err(ErrorCode::Forbidden);
            }
        }

        let now = now_timestamp();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.to_string(),
            content,
            image_url: image_url.filter(|u| !u.trim().is_empty()),
            receiver_id,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(&format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"))
            .bind(&message.id)
            .bind(&message.sender_id)
            .bind(&message.content)
            .bind(&message.image_url)
            .bind(&message.receiver_id)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        info!(message_id = %message.id, sender = %sender, direct = message.receiver_id.is_some(), "message posted");
        Ok(message)
    }

    /// Replaces the content of one of the author's messages.
    pub async fn edit(&self, author: &str, id: &str, content: String) -> Result<Message> {
        let mut message = sqlx::query_as::<_, Message>(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(ErrorCode::NotFound)?;

        if message.sender_id != author {
            return Err(ErrorCode::Forbidden);
        }

        let now = now_timestamp();
        sqlx::query("UPDATE messages SET content = ?, updated_at = ? WHERE id = ?")
            .bind(&content)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        message.content = content;
        message.updated_at = now;
        info!(message_id = %id, "message edited");
        Ok(message)
    }
}
