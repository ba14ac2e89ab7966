use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer from the server, with the message it sent back.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("mqtt error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Validation(String),

    #[error("not signed in")]
    NotSignedIn,
}

pub type Result<T> = std::result::Result<T, ShareError>;
