use crate::db::is_unique_violation;
use crate::error::{ErrorCode, Result, db_error};
use sm_share::model::{
    FriendRequest, FriendRequestStatus, FriendRequestWithSender, FriendSummary, Friendship, Message, Profile,
};
use sm_share::{FriendGraph, now_timestamp};
use sqlx::MySqlPool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

const FRIENDSHIP_COLUMNS: &str = "user_id, friend_id, 'accepted' AS status, created_at";
const REQUEST_COLUMNS: &str = "id, sender_id, receiver_id, status, created_at, updated_at";

/// Why a friend request could not be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRefusal {
    ToSelf,
    UnknownUser,
    AlreadyPending,
    AlreadyFriends,
}

impl SendRefusal {
    pub fn message(&self) -> &'static str {
        match self {
            Self::ToSelf => "You cannot send a friend request to yourself",
            Self::UnknownUser => "User not found",
            Self::AlreadyPending => "Already Pending Friend Request",
            Self::AlreadyFriends => "You are already friends with this user",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ToSelf => ErrorCode::InvalidInput,
            Self::UnknownUser => ErrorCode::NotFound,
            Self::AlreadyPending | Self::AlreadyFriends => ErrorCode::Conflict,
        }
    }
}

/// Value of `friend_requests.pair_key`: the same for both directions of a pair.
pub fn pending_pair_key(a: &str, b: &str) -> String {
    format!("{}:{}", a.min(b), a.max(b))
}

/// Decides whether `sender` may ask `receiver`, given everything known between them.
pub fn check_send(
    sender: &str,
    receiver: &str,
    receiver_exists: bool,
    graph: &FriendGraph,
    requests: &[FriendRequest],
) -> std::result::Result<(), SendRefusal> {
    if sender == receiver {
        return Err(SendRefusal::ToSelf);
    }
    if !receiver_exists {
        return Err(SendRefusal::UnknownUser);
    }
    if graph.are_friends(sender, receiver) {
        return Err(SendRefusal::AlreadyFriends);
    }
    let pending_between = requests.iter().any(|r| {
        r.is_pending()
            && ((r.sender_id == sender && r.receiver_id == receiver)
                || (r.sender_id == receiver && r.receiver_id == sender))
    });
    if pending_between {
        return Err(SendRefusal::AlreadyPending);
    }
    Ok(())
}

/// Orders friend summaries: the viewer first, then friends by display name.
pub fn summarize(viewer: &Profile, friends: Vec<Profile>, public_messages: &[Message]) -> Vec<FriendSummary> {
    let mut by_sender: HashMap<&str, Vec<&Message>> = HashMap::new();
    for message in public_messages.iter().filter(|m| m.is_public()) {
        by_sender.entry(message.sender_id.as_str()).or_default().push(message);
    }
    let summary = |profile: Profile, is_self: bool| {
        let messages = by_sender.get(profile.id.as_str());
        FriendSummary {
            messages_count: messages.map_or(0, |m| m.len() as u64),
            latest_message: messages
                .and_then(|m| m.iter().max_by_key(|m| m.created_at))
                .map(|m| (*m).clone()),
            profile,
            is_self,
        }
    };

    let mut friends = friends;
    friends.retain(|f| f.id != viewer.id);
    friends.sort_by(|a, b| a.display_name().cmp(b.display_name()));

    let mut out = Vec::with_capacity(friends.len() + 1);
    out.push(summary(viewer.clone(), true));
    out.extend(friends.into_iter().map(|f| summary(f, false)));
    out
}

pub struct FriendService {
    pool: MySqlPool,
}

impl FriendService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Friendship edges touching `user_id`.
    pub async fn friendships_of(&self, user_id: &str) -> Result<Vec<Friendship>> {
        sqlx::query_as::<_, Friendship>(&format!(
            "SELECT {FRIENDSHIP_COLUMNS} FROM friendships WHERE user_id = ? OR friend_id = ?"
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    pub async fn graph_of(&self, user_id: &str) -> Result<FriendGraph> {
        Ok(FriendGraph::from_edges(&self.friendships_of(user_id).await?))
    }

    pub async fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM friendships WHERE user_id = ? AND friend_id = ?")
            .bind(a.min(b))
            .bind(a.max(b))
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count > 0)
    }

    /// Pending requests the user sent or received.
    pub async fn pending_involving(&self, user_id: &str) -> Result<Vec<FriendRequest>> {
        sqlx::query_as::<_, FriendRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests
             WHERE (sender_id = ? OR receiver_id = ?) AND status = 'pending'"
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    pub async fn send_request(
        &self,
        sender: &str,
        receiver: &str,
    ) -> Result<std::result::Result<FriendRequest, SendRefusal>> {
        let receiver_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE id = ?")
            .bind(receiver)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        let graph = self.graph_of(sender).await?;
        let pending = self.pending_involving(sender).await?;
        if let Err(refusal) = check_send(sender, receiver, receiver_exists > 0, &graph, &pending) {
            return Ok(Err(refusal));
        }

        let now = now_timestamp();
        let request = FriendRequest {
            id: Uuid::new_v4().to_string(),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let inserted = sqlx::query(
            "INSERT INTO friend_requests (id, sender_id, receiver_id, status, pair_key, created_at, updated_at)
             VALUES (?, ?, ?, 'pending', ?, ?, ?)",
        )
        .bind(&request.id)
        .bind(&request.sender_id)
        .bind(&request.receiver_id)
        .bind(pending_pair_key(sender, receiver))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;
        match inserted {
            Ok(_) => {}
            // A concurrent request for the same pair won the race.
            Err(e) if is_unique_violation(&e) => return Ok(Err(SendRefusal::AlreadyPending)),
            Err(e) => return Err(db_error(e)),
        }

        info!(sender = %sender, receiver = %receiver, "friend request sent");
        Ok(Ok(request))
    }

    /// Pending requests addressed to `receiver`, newest first, each with its sender's profile.
    pub async fn requests_for(&self, receiver: &str) -> Result<Vec<FriendRequestWithSender>> {
        let requests = sqlx::query_as::<_, FriendRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests
             WHERE receiver_id = ? AND status = 'pending'
             ORDER BY created_at DESC"
        ))
        .bind(receiver)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let senders = sqlx::query_as::<_, Profile>(
            "SELECT p.id, p.nickname, p.email, p.avatar_url, p.created_at, p.updated_at
             FROM profiles p JOIN friend_requests r ON r.sender_id = p.id
             WHERE r.receiver_id = ? AND r.status = 'pending'",
        )
        .bind(receiver)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        let senders: HashMap<String, Profile> = senders.into_iter().map(|p| (p.id.clone(), p)).collect();

        Ok(requests
            .into_iter()
            .filter_map(|request| {
                let sender = senders.get(&request.sender_id)?.clone();
                Some(FriendRequestWithSender { request, sender })
            })
            .collect())
    }

    /// Accepts the request `sender` sent to `receiver` and creates the friendship edge, in one
    /// transaction. `NotFound` when no such request exists, `Conflict` when already accepted.
    pub async fn accept(&self, receiver: &str, sender: &str) -> Result<(FriendRequest, Friendship)> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let mut request = sqlx::query_as::<_, FriendRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests
             WHERE sender_id = ? AND receiver_id = ?
             ORDER BY status = 'pending' DESC, created_at DESC
             LIMIT 1 FOR UPDATE"
        ))
        .bind(sender)
        .bind(receiver)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or(ErrorCode::NotFound)?;

        if request.status == FriendRequestStatus::Accepted {
            return Err(ErrorCode::Conflict);
        }

        let now = now_timestamp();
        sqlx::query("UPDATE friend_requests SET status = 'accepted', updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&request.id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let friendship = Friendship::between(sender, receiver, now);
        sqlx::query("INSERT IGNORE INTO friendships (user_id, friend_id, created_at) VALUES (?, ?, ?)")
            .bind(&friendship.user_id)
            .bind(&friendship.friend_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        request.status = FriendRequestStatus::Accepted;
        request.updated_at = now;
        info!(sender = %sender, receiver = %receiver, "friend request accepted");
        Ok((request, friendship))
    }

    /// The viewer's own summary followed by one per friend.
    pub async fn summaries(&self, viewer: &Profile) -> Result<Vec<FriendSummary>> {
        let friends = sqlx::query_as::<_, Profile>(
            "SELECT p.id, p.nickname, p.email, p.avatar_url, p.created_at, p.updated_at
             FROM profiles p JOIN friendships f
               ON (f.user_id = ? AND f.friend_id = p.id) OR (f.friend_id = ? AND f.user_id = p.id)",
        )
        .bind(&viewer.id)
        .bind(&viewer.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let messages = sqlx::query_as::<_, Message>(
            "SELECT m.id, m.sender_id, m.content, m.image_url, m.receiver_id, m.created_at, m.updated_at
             FROM messages m
             WHERE m.receiver_id IS NULL
               AND (m.sender_id = ? OR EXISTS (
                   SELECT 1 FROM friendships f
                   WHERE (f.user_id = ? AND f.friend_id = m.sender_id) OR (f.friend_id = ? AND f.user_id = m.sender_id)
               ))",
        )
        .bind(&viewer.id)
        .bind(&viewer.id)
        .bind(&viewer.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(summarize(viewer, friends, &messages))
    }
}
