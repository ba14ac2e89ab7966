use axum::{extract::{Extension, Path}, response::IntoResponse, Json};
use sqlx::MySqlPool;
use tracing::{info, warn};
use crate::{
    changes::ChangePublisher,
    error::{ErrorCode, reject},
    middleware::auth::CurrentUser,
    service::ProfileService,
};
use sm_share::api::UpdateProfileReq;
use sm_share::model::{ChangeKind, Table};

pub async fn get_me(
    Extension(pool): Extension<MySqlPool>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match ProfileService::new(pool).get(&user.id).await {
        Ok(profile) => Ok(Json(profile)),
        Err(ErrorCode::NotFound) => Err(reject(ErrorCode::Unauthorized, "User not found")),
        Err(code) => Err(reject(code, "Failed to load profile")),
    }
}

pub async fn update_me(
    Extension(pool): Extension<MySqlPool>,
    Extension(changes): Extension<ChangePublisher>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileReq>,
) -> impl IntoResponse {
    match ProfileService::new(pool).update(&user.id, &payload).await {
        Ok(profile) => {
            changes.publish(Table::Profiles, ChangeKind::Update, &profile).await;
            info!(user_id = %user.id, "profile updated");
            Ok(Json(profile))
        }
        Err(code) => {
            warn!(user_id = %user.id, error = %code, "profile update failed");
            Err(reject(code, "Failed to update profile"))
        }
    }
}

pub async fn get_profile(
    Extension(pool): Extension<MySqlPool>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ProfileService::new(pool).get(&id).await {
        Ok(profile) => Ok(Json(profile)),
        Err(ErrorCode::NotFound) => Err(reject(ErrorCode::NotFound, "User not found")),
        Err(code) => Err(reject(code, "Failed to load profile")),
    }
}

/// Profiles the caller might befriend.
pub async fn recommended(
    Extension(pool): Extension<MySqlPool>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match ProfileService::new(pool).recommended(&user.id).await {
        Ok(profiles) => {
            info!(user_id = %user.id, count = profiles.len(), "recommended profiles");
            Ok(Json(profiles))
        }
        Err(code) => Err(reject(code, "Failed to load profiles")),
    }
}
