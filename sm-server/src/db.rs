use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use crate::config::AppConfig;
use tracing::info;

pub async fn create_pool(cfg: &AppConfig) -> anyhow::Result<MySqlPool> {
    let db_cfg = &cfg.database;

    info!("connecting to database {}@{}:{}/{}", db_cfg.user, db_cfg.host, db_cfg.port, db_cfg.database);

    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&db_cfg.url())
        .await?;

    info!("database pool ready");

    Ok(pool)
}

/// True when the error is a unique-key violation, e.g. a duplicate email.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}
