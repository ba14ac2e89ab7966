use serde::{Deserialize, Serialize};

use super::{FriendshipStatus, Profile};

/// A secret message. `receiver_id == None` marks a public post, anything else is a direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Message {
    pub fn is_public(&self) -> bool {
        self.receiver_id.is_none()
    }
}

/// A message annotated with how the viewer relates to its sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithStatus {
    #[serde(flatten)]
    pub message: Message,
    pub friendship_status: FriendshipStatus,
}

/// One entry of the friend list: the friend's profile plus a summary of their public messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendSummary {
    pub profile: Profile,
    pub messages_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<Message>,
    #[serde(default)]
    pub is_self: bool,
}
