pub mod profile;
pub use profile::Profile;

pub mod message;
pub use message::{Message, MessageWithStatus, FriendSummary};

pub mod friendship;
pub use friendship::{Friendship, FriendRequest, FriendRequestStatus, FriendRequestWithSender, FriendshipStatus};

pub mod change;
pub use change::{ChangeEvent, ChangeKind, Table, RowFilter};
