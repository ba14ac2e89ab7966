pub mod account_service;
pub mod friend_service;
pub mod message_service;
pub mod profile_service;
pub mod storage_service;

pub use account_service::AccountService;
pub use friend_service::FriendService;
pub use message_service::MessageService;
pub use profile_service::ProfileService;
pub use storage_service::StorageService;
