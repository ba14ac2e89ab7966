use axum::{extract::{Extension, Path}, response::IntoResponse, Json};
use sqlx::MySqlPool;
use tracing::{info, warn};
use crate::{
    changes::ChangePublisher,
    error::{ErrorCode, reject},
    middleware::auth::CurrentUser,
    service::{MessageService, message_service::NOT_FRIENDS_MESSAGE},
};
use sm_share::api::{EditMessageReq, PostMessageReq};
use sm_share::model::{ChangeKind, Table};
use sm_share::validation::normalize_content;

pub async fn list_public(
    Extension(pool): Extension<MySqlPool>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match MessageService::new(pool).list_public(&user.id).await {
        Ok(messages) => {
            info!(user_id = %user.id, count = messages.len(), "public messages");
            Ok(Json(messages))
        }
        Err(code) => Err(reject(code, "Failed to load messages")),
    }
}

pub async fn list_by_user(
    Extension(pool): Extension<MySqlPool>,
    Extension(user): Extension<CurrentUser>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match MessageService::new(pool).list_by_user(&user.id, &user_id).await {
        Ok(messages) => Ok(Json(messages)),
        Err(ErrorCode::Forbidden) => {
            warn!(viewer = %user.id, owner = %user_id, "messages of a non-friend requested");
            Err(reject(ErrorCode::Forbidden, NOT_FRIENDS_MESSAGE))
        }
        Err(code) => Err(reject(code, "Failed to load messages")),
    }
}

pub async fn chat(
    Extension(pool): Extension<MySqlPool>,
    Extension(user): Extension<CurrentUser>,
    Path(friend_id): Path<String>,
) -> impl IntoResponse {
    match MessageService::new(pool).chat(&user.id, &friend_id).await {
        Ok(messages) => Ok(Json(messages)),
        Err(ErrorCode::Forbidden) => Err(reject(ErrorCode::Forbidden, "You can only chat with your friends")),
        Err(code) => Err(reject(code, "Failed to load chat")),
    }
}

pub async fn post_message(
    Extension(pool): Extension<MySqlPool>,
    Extension(changes): Extension<ChangePublisher>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<PostMessageReq>,
) -> impl IntoResponse {
    let content = match normalize_content(&payload.content) {
        Ok(content) => content,
        Err(e) => return Err(reject(ErrorCode::InvalidInput, e.to_string())),
    };

    match MessageService::new(pool)
        .post(&user.id, content, payload.image_url, payload.receiver_id)
        .await
    {
        Ok(message) => {
            changes.publish(Table::Messages, ChangeKind::Insert, &message).await;
            Ok(Json(message))
        }
        Err(ErrorCode::Forbidden) => Err(reject(ErrorCode::Forbidden, "You can only message your friends")),
        Err(code) => Err(reject(code, "Failed to post message")),
    }
}

pub async fn edit_message(
    Extension(pool): Extension<MySqlPool>,
    Extension(changes): Extension<ChangePublisher>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<EditMessageReq>,
) -> impl IntoResponse {
    let content = match normalize_content(&payload.content) {
        Ok(content) => content,
        Err(e) => return Err(reject(ErrorCode::InvalidInput, e.to_string())),
    };

    match MessageService::new(pool).edit(&user.id, &id, content).await {
        Ok(message) => {
            changes.publish(Table::Messages, ChangeKind::Update, &message).await;
            Ok(Json(message))
        }
        Err(ErrorCode::NotFound) => Err(reject(ErrorCode::NotFound, "Message not found")),
        Err(ErrorCode::Forbidden) => Err(reject(ErrorCode::Forbidden, "You can only edit your own messages")),
        Err(code) => Err(reject(code, "Failed to edit message")),
    }
}
