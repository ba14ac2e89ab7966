pub mod account_handler;
pub mod auth_handler;
pub mod friend_handler;
pub mod message_handler;
pub mod profile_handler;
pub mod realtime_handler;
pub mod upload_handler;
