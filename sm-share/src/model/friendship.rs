use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Profile;

/// An accepted friendship, stored once per unordered pair with `user_id < friend_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Friendship {
    pub user_id: String,
    pub friend_id: String,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub status: FriendRequestStatus,
    pub created_at: i64,
}

impl Friendship {
    /// Builds the edge between `a` and `b` in canonical order.
    pub fn between(a: &str, b: &str, created_at: i64) -> Self {
        let (user_id, friend_id) = if a <= b { (a, b) } else { (b, a) };
        Self {
            user_id: user_id.to_string(),
            friend_id: friend_id.to_string(),
            status: FriendRequestStatus::Accepted,
            created_at,
        }
    }

    /// The endpoint that is not `user`, or `None` if `user` is not on this edge.
    pub fn other(&self, user: &str) -> Option<&str> {
        if self.user_id == user {
            Some(&self.friend_id)
        } else if self.friend_id == user {
            Some(&self.user_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

impl fmt::Display for FriendRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            other => Err(format!("unknown friend request status: {other}")),
        }
    }
}

impl TryFrom<String> for FriendRequestStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FriendRequest {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[cfg_attr(feature = "sqlx", sqlx(try_from = "String"))]
    pub status: FriendRequestStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FriendRequest {
    pub fn is_pending(&self) -> bool {
        self.status == FriendRequestStatus::Pending
    }
}

/// A pending request as shown to its receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequestWithSender {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub sender: Profile,
}

/// How a viewer relates to another user. Derived on every read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    #[serde(rename = "self")]
    Myself,
    Friends,
    PendingSent,
    PendingReceived,
    None,
}

impl FriendshipStatus {
    /// Whether the viewer may open the other user's secret messages.
    pub fn can_view_messages(&self) -> bool {
        matches!(self, Self::Myself | Self::Friends)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Myself => "self",
            Self::Friends => "friends",
            Self::PendingSent => "pending_sent",
            Self::PendingReceived => "pending_received",
            Self::None => "none",
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
