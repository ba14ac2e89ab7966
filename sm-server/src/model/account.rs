use serde::Serialize;
use serde_json::{Value, json};
use sm_share::model::{FriendRequest, Friendship, Profile, Table};
use sqlx::FromRow;

/// A `profiles` row including the credential columns that never leave the server.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
    pub id: String,
    pub nickname: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Account {
    pub fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            nickname: self.nickname,
            email: self.email,
            avatar_url: self.avatar_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Row counts removed by an account deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub messages: u64,
    pub friend_requests: u64,
    pub friendships: u64,
}

/// What an account deletion removed, kept so watchers of every touched table can be told.
#[derive(Debug, Clone, Default)]
pub struct Deletion {
    pub report: DeletionReport,
    pub friendships: Vec<Friendship>,
    pub friend_requests: Vec<FriendRequest>,
}

impl Deletion {
    /// DELETE event records, one per table row a watcher could be filtering on. The profile event
    /// comes last.
    pub fn events(&self, user_id: &str) -> Vec<(Table, Value)> {
        let mut events = Vec::with_capacity(self.friendships.len() + self.friend_requests.len() + 2);
        if self.report.messages > 0 {
            events.push((Table::Messages, json!({ "sender_id": user_id })));
        }
        for edge in &self.friendships {
            events.push((Table::Friends, json!(edge)));
        }
        for request in &self.friend_requests {
            events.push((Table::FriendRequests, json!(request)));
        }
        events.push((Table::Profiles, json!({ "id": user_id })));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_share::model::FriendRequestStatus;

    #[test]
    fn deletion_announces_every_removed_row() {
        let deletion = Deletion {
            report: DeletionReport { messages: 3, friend_requests: 1, friendships: 2 },
            friendships: vec![
                Friendship {
                    user_id: "u1".to_string(),
                    friend_id: "u2".to_string(),
                    status: FriendRequestStatus::Accepted,
                    created_at: 1,
                },
                Friendship {
                    user_id: "u0".to_string(),
                    friend_id: "u1".to_string(),
                    status: FriendRequestStatus::Accepted,
                    created_at: 2,
                },
            ],
            friend_requests: vec![FriendRequest {
                id: "r1".to_string(),
                sender_id: "u3".to_string(),
                receiver_id: "u1".to_string(),
                status: FriendRequestStatus::Pending,
                created_at: 3,
                updated_at: 3,
            }],
        };

        let events = deletion.events("u1");
        let tables: Vec<Table> = events.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tables,
            vec![Table::Messages, Table::Friends, Table::Friends, Table::FriendRequests, Table::Profiles]
        );
        assert_eq!(events[0].1, json!({"sender_id": "u1"}));
        assert_eq!(events[1].1["friend_id"], "u2");
        assert_eq!(events[2].1["user_id"], "u0");
        assert_eq!(events[3].1["sender_id"], "u3");
        assert_eq!(events[3].1["receiver_id"], "u1");
        assert_eq!(events[4].1, json!({"id": "u1"}));
    }

    #[test]
    fn lone_profile_deletion_announces_only_the_profile() {
        let events = Deletion::default().events("u9");
        assert_eq!(events, vec![(Table::Profiles, json!({"id": "u9"}))]);
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let account = Account {
            id: "u1".to_string(),
            nickname: None,
            email: "ana@example.com".to_string(),
            password_hash: "$2b$12$abc".to_string(),
            avatar_url: None,
            created_at: 1,
            updated_at: 1,
        };
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(account.into_profile().email, "ana@example.com");
    }
}
