use axum::{Router, extract::DefaultBodyLimit};
use tower_http::{cors::{CorsLayer, Any}, trace::TraceLayer, limit::RequestBodyLimitLayer};
use tokio::net::TcpListener;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::http::{header, Method};
use anyhow::Context;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;
mod changes;
mod config;
mod db;
mod dto;
mod error;
mod handlers;
mod middleware;
mod model;
mod routes;
mod service;

use crate::{
    changes::ChangePublisher,
    config::AppConfig,
    routes::AppState,
    service::StorageService,
};
use sm_share::{RedisClient, RedisConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::load()?;

    let storage = Arc::new(StorageService::new(cfg.storage.clone()));
    storage.init().with_context(|| format!("cannot create storage directory {}", cfg.storage.path))?;
    tracing::info!(path = %cfg.storage.path, "storage ready");

    let pool = db::create_pool(&cfg).await.context("database connection failed")?;

    let redis = RedisClient::new(&RedisConfig::from(&cfg.redis))
        .await
        .context("redis connection failed")?;

    let changes = ChangePublisher::from_settings(&cfg.mqtt);

    let state = AppState { pool, jwt: cfg.jwt.clone(), redis, changes, storage };
    let public_routes = routes::create_public_routes(state.clone());
    let protected_routes = routes::create_protected_routes(state);

    let body_limit = cfg.server.max_body_mb * 1024 * 1024;
    let app = Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(vec![Method::GET, Method::POST, Method::PUT])
                .allow_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION]),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("cannot bind {addr}"))?;

    routes::print_routes();
    tracing::info!("API listening on http://{}", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
