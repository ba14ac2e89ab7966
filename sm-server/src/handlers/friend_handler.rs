use axum::{extract::{Extension, Path}, response::IntoResponse, Json};
use sqlx::MySqlPool;
use tracing::{info, warn};
use crate::{
    changes::ChangePublisher,
    error::{ErrorCode, reject},
    middleware::auth::CurrentUser,
    service::{FriendService, ProfileService},
};
use sm_share::api::{Ack, SendFriendRequestReq};
use sm_share::model::{ChangeKind, Table};

/// The caller's own summary followed by one per friend.
pub async fn get_friends(
    Extension(pool): Extension<MySqlPool>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    let viewer = match ProfileService::new(pool.clone()).get(&user.id).await {
        Ok(profile) => profile,
        Err(ErrorCode::NotFound) => return Err(reject(ErrorCode::Unauthorized, "User not found")),
        Err(code) => return Err(reject(code, "Failed to load friends")),
    };

    match FriendService::new(pool).summaries(&viewer).await {
        Ok(friends) => {
            info!(user_id = %user.id, count = friends.len() - 1, "friend list");
            Ok(Json(friends))
        }
        Err(code) => Err(reject(code, "Failed to load friends")),
    }
}

pub async fn list_requests(
    Extension(pool): Extension<MySqlPool>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match FriendService::new(pool).requests_for(&user.id).await {
        Ok(requests) => Ok(Json(requests)),
        Err(code) => Err(reject(code, "Failed to load friend requests")),
    }
}

pub async fn send_request(
    Extension(pool): Extension<MySqlPool>,
    Extension(changes): Extension<ChangePublisher>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<SendFriendRequestReq>,
) -> impl IntoResponse {
    match FriendService::new(pool).send_request(&user.id, &payload.receiver_id).await {
        Ok(Ok(request)) => {
            changes.publish(Table::FriendRequests, ChangeKind::Insert, &request).await;
            Ok(Json(Ack::ok("Friend request sent")))
        }
        Ok(Err(refusal)) => {
            warn!(sender = %user.id, receiver = %payload.receiver_id, ?refusal, "friend request refused");
            Err(reject(refusal.code(), refusal.message()))
        }
        Err(code) => Err(reject(code, "Failed to send friend request")),
    }
}

/// Accepts the pending request `sender_id` sent to the caller.
pub async fn accept_request(
    Extension(pool): Extension<MySqlPool>,
    Extension(changes): Extension<ChangePublisher>,
    Extension(user): Extension<CurrentUser>,
    Path(sender_id): Path<String>,
) -> impl IntoResponse {
    match FriendService::new(pool).accept(&user.id, &sender_id).await {
        Ok((request, friendship)) => {
            changes.publish(Table::FriendRequests, ChangeKind::Update, &request).await;
            changes.publish(Table::Friends, ChangeKind::Insert, &friendship).await;
            Ok(Json(Ack::ok("Friend request accepted")))
        }
        Err(ErrorCode::NotFound) => Err(reject(ErrorCode::NotFound, "Friend request not found")),
        Err(ErrorCode::Conflict) => Err(reject(ErrorCode::Conflict, "Friend request already accepted")),
        Err(code) => Err(reject(code, "Failed to accept friend request")),
    }
}
