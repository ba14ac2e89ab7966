use anyhow::Context;
use serde::Deserialize;
use sm_share::{JwtSettings, MqttConfig, RedisConfig};
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub port: u16,
    #[serde(default = "default_max_body_mb")]
    pub max_body_mb: usize,
}

fn default_max_body_mb() -> usize {
    12
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DatabaseSettings {
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub db: u8,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_redis_port() -> u16 {
    6379
}

impl From<&RedisSettings> for RedisConfig {
    fn from(s: &RedisSettings) -> Self {
        RedisConfig::new(s.host.clone(), s.port, s.db, s.password.clone())
    }
}

/// Change events go through the broker when enabled, otherwise they stay in process.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttSettings {
    #[serde(default)]
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl MqttSettings {
    pub fn client_config(&self, client_id: impl Into<String>) -> MqttConfig {
        MqttConfig::new(self.host.clone(), self.port, client_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Prefix of the URLs handed out for stored objects.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    #[serde(default = "default_max_image_size_mb")]
    pub max_image_size_mb: u64,
    #[serde(default = "default_thumbnail_max")]
    pub thumbnail_max_width: u32,
    #[serde(default = "default_thumbnail_max")]
    pub thumbnail_max_height: u32,
}

fn default_storage_path() -> String {
    "storage".to_string()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:3000/api/storage".to_string()
}

fn default_max_image_size_mb() -> u64 {
    10
}

fn default_thumbnail_max() -> u32 {
    800
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            public_base_url: default_public_base_url(),
            max_image_size_mb: default_max_image_size_mb(),
            thumbnail_max_width: default_thumbnail_max(),
            thumbnail_max_height: default_thumbnail_max(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub redis: RedisSettings,
    pub mqtt: MqttSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

const DEFAULT_CONFIG: &str = r#"
[server]
port = 3000
max_body_mb = 12

[database]
host = "127.0.0.1"
port = 3306
user = "root"
password = "123456"
database = "secret_messages"

[jwt]
secret = "your-secret-key-change-in-production"
expiration_hours = 24

[redis]
host = "127.0.0.1"
port = 6379
db = 0

[mqtt]
enabled = false
host = "127.0.0.1"
port = 1883

[storage]
path = "storage"
public_base_url = "http://127.0.0.1:3000/api/storage"
max_image_size_mb = 10
thumbnail_max_width = 800
thumbnail_max_height = 800
"#;

impl AppConfig {
    /// Reads the file named by `SM_SERVER_CONFIG`, falling back to the built-in defaults when the
    /// file is missing, then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("SM_SERVER_CONFIG").unwrap_or_else(|_| "sm-server/config.toml".to_string());

        let mut config = match fs::read_to_string(Path::new(&path)) {
            Ok(content) => Self::parse(&content).with_context(|| format!("invalid config file {path}"))?,
            Err(_) => {
                tracing::warn!(path = %path, "config file not found, using defaults");
                Self::parse(DEFAULT_CONFIG).context("invalid default config")?
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = var("DATABASE_HOST") {
            self.database.host = host;
        }
        if let Some(password) = var("DATABASE_PASSWORD") {
            self.database.password = password;
        }
        if let Some(secret) = var("JWT_SECRET") {
            self.jwt.secret = secret;
        }
        if let Some(host) = var("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Some(host) = var("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(enabled) = var("MQTT_ENABLED").and_then(|v| v.parse().ok()) {
            self.mqtt.enabled = enabled;
        }
        if let Some(path) = var("STORAGE_PATH") {
            self.storage.path = path;
        }
        if let Some(url) = var("STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = url;
        }
    }
}
