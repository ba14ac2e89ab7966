use redis::Client;
use redis::aio::ConnectionManager;
use tracing::info;

/// Redis settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: u8,
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            password: None,
        }
    }
}

impl RedisConfig {
    pub fn new(host: String, port: u16, db: u8, password: Option<String>) -> Self {
        Self { host, port, db, password }
    }

    pub fn url(&self) -> String {
        match self.password {
            Some(ref password) => format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

fn revoked_key(jti: &str) -> String {
    format!("auth:revoked:{}", jti)
}

/// Redis client wrapper. The connection manager is cheap to clone and reconnects on its own.
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    pub async fn new(config: &RedisConfig) -> Result<Self, redis::RedisError> {
        info!("connecting to Redis {}:{}/{}", config.host, config.port, config.db);

        let client = Client::open(config.url())?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Redis connected");
        Ok(Self { manager })
    }

    /// Sets a key that expires after `ttl` seconds.
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: u64) -> Result<(), redis::RedisError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.max(1))
            .query_async(&mut conn)
            .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.manager.clone();
        redis::cmd("GET").arg(key).query_async(&mut conn).await
    }

    pub async fn del(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL").arg(key).query_async(&mut conn).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, redis::RedisError> {
        let mut conn = self.manager.clone();
        redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
    }

    /// Deny-lists a token id until the token would have expired anyway.
    pub async fn revoke_token(&self, jti: &str, ttl_secs: u64) -> Result<(), redis::RedisError> {
        self.set_with_ttl(&revoked_key(jti), "1", ttl_secs).await
    }

    pub async fn is_token_revoked(&self, jti: &str) -> Result<bool, redis::RedisError> {
        self.exists(&revoked_key(jti)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_includes_password_when_set() {
        let plain = RedisConfig::default();
        assert_eq!(plain.url(), "redis://127.0.0.1:6379/0");
        let secured = RedisConfig::new("cache".to_string(), 6380, 2, Some("pw".to_string()));
        assert_eq!(secured.url(), "redis://:pw@cache:6380/2");
    }

    #[test]
    fn revocation_keys_are_namespaced() {
        assert_eq!(revoked_key("abc"), "auth:revoked:abc");
    }
}
