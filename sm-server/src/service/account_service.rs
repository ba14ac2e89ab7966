use crate::error::{ErrorCode, Result, db_error};
use crate::model::{Deletion, DeletionReport};
use sm_share::model::{FriendRequest, Friendship};
use sqlx::MySqlPool;
use tracing::info;

pub struct AccountService {
    pool: MySqlPool,
}

impl AccountService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Removes the profile together with its messages, friend requests and friendship edges.
    /// `NotFound` when the profile does not exist; nothing is removed in that case.
    pub async fn delete(&self, user_id: &str) -> Result<Deletion> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let removed_edges = sqlx::query_as::<_, Friendship>(
            "SELECT user_id, friend_id, 'accepted' AS status, created_at FROM friendships
             WHERE user_id = ? OR friend_id = ? FOR UPDATE",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

        let removed_requests = sqlx::query_as::<_, FriendRequest>(
            "SELECT id, sender_id, receiver_id, status, created_at, updated_at FROM friend_requests
             WHERE sender_id = ? OR receiver_id = ? FOR UPDATE",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error)?;

        let messages = sqlx::query("DELETE FROM messages WHERE sender_id = ? OR receiver_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        let friend_requests = sqlx::query("DELETE FROM friend_requests WHERE sender_id = ? OR receiver_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        let friendships = sqlx::query("DELETE FROM friendships WHERE user_id = ? OR friend_id = ?")
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        let profiles = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?
            .rows_affected();

        if profiles == 0 {
            tx.rollback().await.map_err(db_error)?;
            return Err(ErrorCode::NotFound);
        }

        tx.commit().await.map_err(db_error)?;

        let report = DeletionReport { messages, friend_requests, friendships };
        info!(user_id = %user_id, ?report, "account deleted");
        Ok(Deletion { report, friendships: removed_edges, friend_requests: removed_requests })
    }
}
