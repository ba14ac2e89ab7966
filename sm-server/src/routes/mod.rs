use axum::{Router, middleware, Extension, routing::{get, post, put}};
use sqlx::MySqlPool;
use std::sync::Arc;
use crate::{
    changes::ChangePublisher,
    handlers::{
        account_handler, auth_handler, friend_handler, message_handler, profile_handler, realtime_handler,
        upload_handler,
    },
    middleware::auth::auth_middleware,
    service::StorageService,
};
use sm_share::{JwtSettings, RedisClient};

/// One registered route, for the startup listing.
#[derive(Debug, Clone, Copy)]
pub struct RouteInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub auth_required: bool,
}

const fn route(method: &'static str, path: &'static str, auth_required: bool) -> RouteInfo {
    RouteInfo { method, path, auth_required }
}

pub const ROUTES: &[RouteInfo] = &[
    route("POST", "/api/auth/sign-up", false),
    route("POST", "/api/auth/sign-in", false),
    route("GET", "/api/storage/{*path}", false),
    route("POST", "/api/auth/sign-out", true),
    route("POST", "/api/delete-account", true),
    route("GET", "/api/profiles/me", true),
    route("PUT", "/api/profiles/me", true),
    route("GET", "/api/profiles/recommended", true),
    route("GET", "/api/profiles/{id}", true),
    route("GET", "/api/messages/public", true),
    route("GET", "/api/messages/user/{user_id}", true),
    route("GET", "/api/messages/chat/{friend_id}", true),
    route("POST", "/api/messages", true),
    route("PUT", "/api/messages/{id}", true),
    route("GET", "/api/friends", true),
    route("GET", "/api/friend-requests", true),
    route("POST", "/api/friend-requests", true),
    route("POST", "/api/friend-requests/{sender_id}/accept", true),
    route("POST", "/api/storage/message-images", true),
    route("GET", "/api/realtime/{table}", true),
];

/// Shared state handed to every handler through request extensions.
#[derive(Clone)]
pub struct AppState {
    pub pool: MySqlPool,
    pub jwt: JwtSettings,
    pub redis: RedisClient,
    pub changes: ChangePublisher,
    pub storage: Arc<StorageService>,
}

pub fn create_public_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/sign-up", post(auth_handler::sign_up))
        .route("/auth/sign-in", post(auth_handler::sign_in))
        .route("/storage/{*path}", get(upload_handler::get_object))
        .layer(Extension(state.pool))
        .layer(Extension(state.jwt))
        .layer(Extension(state.changes))
        .layer(Extension(state.storage))
}

pub fn create_protected_routes(state: AppState) -> Router {
    Router::new()
        .route("/auth/sign-out", post(auth_handler::sign_out))
        .route("/delete-account", post(account_handler::delete_account))
        .route("/profiles/me", get(profile_handler::get_me).put(profile_handler::update_me))
        .route("/profiles/recommended", get(profile_handler::recommended))
        .route("/profiles/{id}", get(profile_handler::get_profile))
        .route("/messages/public", get(message_handler::list_public))
        .route("/messages/user/{user_id}", get(message_handler::list_by_user))
        .route("/messages/chat/{friend_id}", get(message_handler::chat))
        .route("/messages", post(message_handler::post_message))
        .route("/messages/{id}", put(message_handler::edit_message))
        .route("/friends", get(friend_handler::get_friends))
        .route("/friend-requests", get(friend_handler::list_requests).post(friend_handler::send_request))
        .route("/friend-requests/{sender_id}/accept", post(friend_handler::accept_request))
        .route("/storage/message-images", post(upload_handler::upload_message_image))
        .route("/realtime/{table}", get(realtime_handler::subscribe))
        .layer(middleware::from_fn(auth_middleware))
        .layer(Extension(state.pool))
        .layer(Extension(state.jwt))
        .layer(Extension(state.redis))
        .layer(Extension(state.changes))
        .layer(Extension(state.storage))
}

pub fn print_routes() {
    let public = ROUTES.iter().filter(|r| !r.auth_required).count();
    tracing::info!(total = ROUTES.len(), public, protected = ROUTES.len() - public, "registered routes");
    for r in ROUTES {
        tracing::info!("  {:<6} {:<45} {}", r.method, r.path, if r.auth_required { "auth" } else { "public" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_table_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for r in ROUTES {
            assert!(seen.insert((r.method, r.path)), "duplicate {} {}", r.method, r.path);
            assert!(r.path.starts_with("/api/"));
        }
        assert_eq!(ROUTES.iter().filter(|r| !r.auth_required).count(), 3);
    }
}
