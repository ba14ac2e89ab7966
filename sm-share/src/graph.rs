use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::Friendship;

/// Unordered pair of user ids; `(a, b)` and `(b, a)` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self(a.to_string(), b.to_string())
        } else {
            Self(b.to_string(), a.to_string())
        }
    }

    pub fn low(&self) -> &str {
        &self.0
    }

    pub fn high(&self) -> &str {
        &self.1
    }
}

/// Friendships as undirected edges with symmetric adjacency.
#[derive(Debug, Clone, Default)]
pub struct FriendGraph {
    edges: HashSet<PairKey>,
    adjacency: HashMap<String, BTreeSet<String>>,
}

impl FriendGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Friendship>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.insert(&edge.user_id, &edge.friend_id);
        }
        graph
    }

    /// Adds the edge. Returns false for self-loops and edges already present.
    pub fn insert(&mut self, a: &str, b: &str) -> bool {
        if a == b || !self.edges.insert(PairKey::new(a, b)) {
            return false;
        }
        self.adjacency.entry(a.to_string()).or_default().insert(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().insert(a.to_string());
        true
    }

    pub fn remove(&mut self, a: &str, b: &str) -> bool {
        if !self.edges.remove(&PairKey::new(a, b)) {
            return false;
        }
        for (from, to) in [(a, b), (b, a)] {
            if let Some(set) = self.adjacency.get_mut(from) {
                set.remove(to);
                if set.is_empty() {
                    self.adjacency.remove(from);
                }
            }
        }
        true
    }

    /// Drops every edge touching `user`.
    pub fn remove_user(&mut self, user: &str) {
        if let Some(friends) = self.adjacency.remove(user) {
            for friend in friends {
                self.edges.remove(&PairKey::new(user, &friend));
                if let Some(set) = self.adjacency.get_mut(&friend) {
                    set.remove(user);
                    if set.is_empty() {
                        self.adjacency.remove(&friend);
                    }
                }
            }
        }
    }

    pub fn are_friends(&self, a: &str, b: &str) -> bool {
        self.edges.contains(&PairKey::new(a, b))
    }

    /// Friends of `user` in id order.
    pub fn friends_of(&self, user: &str) -> impl Iterator<Item = &str> {
        self.adjacency.get(user).into_iter().flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_symmetric() {
        let mut graph = FriendGraph::new();
        assert!(graph.insert("u2", "u1"));
        assert!(!graph.insert("u1", "u2"));
        assert!(graph.are_friends("u1", "u2"));
        assert!(graph.are_friends("u2", "u1"));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.friends_of("u1").collect::<Vec<_>>(), vec!["u2"]);
        assert_eq!(graph.friends_of("u2").collect::<Vec<_>>(), vec!["u1"]);
    }

    #[test]
    fn self_loops_are_ignored() {
        let mut graph = FriendGraph::new();
        assert!(!graph.insert("u1", "u1"));
        assert!(graph.is_empty());
    }

    #[test]
    fn removal_clears_both_sides() {
        let mut graph = FriendGraph::from_edges(&[
            Friendship::between("u1", "u2", 0),
            Friendship::between("u1", "u3", 0),
            Friendship::between("u2", "u3", 0),
        ]);
        assert!(graph.remove("u2", "u1"));
        assert!(!graph.are_friends("u1", "u2"));
        assert_eq!(graph.friends_of("u1").collect::<Vec<_>>(), vec!["u3"]);

        graph.remove_user("u3");
        assert!(graph.is_empty());
        assert_eq!(graph.friends_of("u1").count(), 0);
    }

    #[test]
    fn pair_key_orders_endpoints() {
        let key = PairKey::new("b", "a");
        assert_eq!((key.low(), key.high()), ("a", "b"));
        assert_eq!(key, PairKey::new("a", "b"));
    }
}
