pub mod api;
pub mod auth;
pub mod bridge;
pub mod classifier;
pub mod client;
pub mod error;
pub mod graph;
pub mod live;
pub mod model;
pub mod mqtt;
pub mod notifier;
pub mod redis;
pub mod session;
pub mod store;
pub mod utils;
pub mod validation;
pub mod ws;

// Re-exports for convenience
pub use auth::{Claims, JwtSettings, bearer_token, generate_token, verify_token};
pub use bridge::{BridgeState, RealtimeBridge};
pub use classifier::{classify, classify_user};
pub use client::ApiClient;
pub use error::{Result, ShareError};
pub use graph::{FriendGraph, PairKey};
pub use live::{LiveView, Watch};
pub use mqtt::{MqttConfig, MqttNotifier};
pub use notifier::{BroadcastNotifier, ChangeNotifier, ChangeStream, Notification};
pub use redis::{RedisClient, RedisConfig};
pub use session::Session;
pub use store::{Collection, LocalStore};
pub use utils::{change_topic, now_timestamp, now_timestamp_seconds};
pub use ws::WsNotifier;
