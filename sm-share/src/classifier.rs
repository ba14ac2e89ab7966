//! Friendship status of message senders relative to a viewer.
//!
//! Pure functions over rows already fetched in full. The result only drives what the viewer is
//! offered (add friend, accept, open messages); the server checks friendship again on every
//! protected read and write.

use std::collections::HashMap;

use crate::model::{FriendRequest, FriendRequestStatus, Friendship, FriendshipStatus, Message, MessageWithStatus};

/// What is known about the viewer's relation to one other user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Friend { status: FriendRequestStatus },
    Request { status: FriendRequestStatus, is_sender: bool },
}

/// Lookup keyed by the counterpart's id.
pub type RelationMap<'a> = HashMap<&'a str, Relation>;

/// Builds the counterpart lookup. Friendship rows are inserted first and are never displaced by a
/// request row for the same counterpart.
pub fn build_relation_map<'a>(
    current_user_id: &str,
    friendships: &'a [Friendship],
    friend_requests: &'a [FriendRequest],
) -> RelationMap<'a> {
    let mut map = RelationMap::new();

    for friendship in friendships {
        let other = if friendship.user_id == current_user_id {
            friendship.friend_id.as_str()
        } else {
            friendship.user_id.as_str()
        };
        map.insert(other, Relation::Friend { status: friendship.status });
    }

    for request in friend_requests {
        if request.status != FriendRequestStatus::Pending {
            continue;
        }
        let is_sender = request.sender_id == current_user_id;
        let other = if is_sender {
            request.receiver_id.as_str()
        } else {
            request.sender_id.as_str()
        };
        map.entry(other).or_insert(Relation::Request { status: request.status, is_sender });
    }

    map
}

pub fn status_for(sender_id: &str, current_user_id: &str, map: &RelationMap<'_>) -> FriendshipStatus {
    if sender_id == current_user_id {
        return FriendshipStatus::Myself;
    }
    match map.get(sender_id) {
        None => FriendshipStatus::None,
        Some(Relation::Friend { .. }) => FriendshipStatus::Friends,
        Some(Relation::Request { is_sender: true, .. }) => FriendshipStatus::PendingSent,
        Some(Relation::Request { is_sender: false, .. }) => FriendshipStatus::PendingReceived,
    }
}

/// Annotates every message with the viewer's status toward its sender. Order is preserved.
pub fn classify(
    current_user_id: &str,
    messages: &[Message],
    friendships: &[Friendship],
    friend_requests: &[FriendRequest],
) -> Vec<MessageWithStatus> {
    let map = build_relation_map(current_user_id, friendships, friend_requests);
    messages
        .iter()
        .map(|message| MessageWithStatus {
            friendship_status: status_for(&message.sender_id, current_user_id, &map),
            message: message.clone(),
        })
        .collect()
}

/// Status of a single counterpart, e.g. for a profile card.
pub fn classify_user(
    current_user_id: &str,
    other_id: &str,
    friendships: &[Friendship],
    friend_requests: &[FriendRequest],
) -> FriendshipStatus {
    let map = build_relation_map(current_user_id, friendships, friend_requests);
    status_for(other_id, current_user_id, &map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str) -> Message {
        Message {
            id: id.to_string(),
            sender_id: sender.to_string(),
            content: "secret".to_string(),
            image_url: None,
            receiver_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn request(sender: &str, receiver: &str, status: FriendRequestStatus) -> FriendRequest {
        FriendRequest {
            id: format!("{sender}-{receiver}"),
            sender_id: sender.to_string(),
            receiver_id: receiver.to_string(),
            status,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn statuses(out: &[MessageWithStatus]) -> Vec<FriendshipStatus> {
        out.iter().map(|m| m.friendship_status).collect()
    }

    #[test]
    fn own_messages_are_self_whatever_the_rows_say() {
        let friendships = vec![Friendship::between("u1", "u1", 0)];
        let requests = vec![request("u1", "u1", FriendRequestStatus::Pending)];
        let out = classify("u1", &[msg("m1", "u1")], &friendships, &requests);
        assert_eq!(statuses(&out), vec![FriendshipStatus::Myself]);
    }

    #[test]
    fn pending_request_seen_from_both_sides() {
        let messages = vec![msg("m1", "u2")];
        let requests = vec![request("u1", "u2", FriendRequestStatus::Pending)];
        let out = classify("u1", &messages, &[], &requests);
        assert_eq!(statuses(&out), vec![FriendshipStatus::PendingSent]);

        let messages = vec![msg("m1", "u1")];
        let out = classify("u2", &messages, &[], &requests);
        assert_eq!(statuses(&out), vec![FriendshipStatus::PendingReceived]);
    }

    #[test]
    fn friendship_beats_stale_request() {
        let friendships = vec![Friendship::between("u1", "u2", 0)];
        let requests = vec![request("u1", "u2", FriendRequestStatus::Pending)];
        let out = classify("u1", &[msg("m1", "u2")], &friendships, &requests);
        assert_eq!(statuses(&out), vec![FriendshipStatus::Friends]);

        let out = classify("u2", &[msg("m1", "u1")], &friendships, &requests);
        assert_eq!(statuses(&out), vec![FriendshipStatus::Friends]);
    }

    #[test]
    fn friendship_listed_after_request_still_wins() {
        let friendships = vec![Friendship::between("u2", "u1", 0)];
        let requests = vec![request("u2", "u1", FriendRequestStatus::Pending)];
        let map = build_relation_map("u1", &friendships, &requests);
        assert_eq!(
            map.get("u2"),
            Some(&Relation::Friend { status: FriendRequestStatus::Accepted })
        );
    }

    #[test]
    fn strangers_are_none() {
        let out = classify("u1", &[msg("m1", "u3"), msg("m2", "")], &[], &[]);
        assert_eq!(statuses(&out), vec![FriendshipStatus::None, FriendshipStatus::None]);
    }

    #[test]
    fn accepted_request_alone_does_not_make_friends() {
        let requests = vec![request("u1", "u2", FriendRequestStatus::Accepted)];
        assert_eq!(classify_user("u1", "u2", &[], &requests), FriendshipStatus::None);
    }

    #[test]
    fn repeated_runs_agree() {
        let messages = vec![msg("m1", "u1"), msg("m2", "u2"), msg("m3", "u3"), msg("m4", "u4")];
        let friendships = vec![Friendship::between("u1", "u3", 0)];
        let requests = vec![
            request("u1", "u2", FriendRequestStatus::Pending),
            request("u4", "u1", FriendRequestStatus::Pending),
        ];
        let first = classify("u1", &messages, &friendships, &requests);
        let second = classify("u1", &messages, &friendships, &requests);
        assert_eq!(first, second);
        assert_eq!(
            statuses(&first),
            vec![
                FriendshipStatus::Myself,
                FriendshipStatus::PendingSent,
                FriendshipStatus::Friends,
                FriendshipStatus::PendingReceived,
            ]
        );
    }
}
