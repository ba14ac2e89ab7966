use axum::{extract::Extension, response::IntoResponse, Json};
use sqlx::MySqlPool;
use tracing::{error, info, warn};
use crate::{
    changes::ChangePublisher,
    error::{ErrorCode, HandlerError, reject},
    middleware::auth::CurrentUser,
    service::ProfileService,
};
use sm_share::api::{Ack, AuthResponse, SignInReq, SignUpReq};
use sm_share::model::{ChangeKind, Profile, Table};
use sm_share::validation::validate_credentials;
use sm_share::{JwtSettings, RedisClient, generate_token};

fn issue(profile: Profile, jwt_cfg: &JwtSettings) -> Result<Json<AuthResponse>, HandlerError> {
    match generate_token(&profile.id, jwt_cfg) {
        Ok(token) => Ok(Json(AuthResponse { token, profile })),
        Err(e) => {
            error!(user_id = %profile.id, error = %e, "failed to sign token");
            Err(reject(ErrorCode::Internal, "Failed to create session"))
        }
    }
}

pub async fn sign_up(
    Extension(pool): Extension<MySqlPool>,
    Extension(jwt_cfg): Extension<JwtSettings>,
    Extension(changes): Extension<ChangePublisher>,
    Json(payload): Json<SignUpReq>,
) -> impl IntoResponse {
    if let Err(e) = validate_credentials(&payload.email, &payload.password) {
        return Err(reject(ErrorCode::InvalidInput, e.to_string()));
    }

    let service = ProfileService::new(pool);
    match service.sign_up(&payload.email, &payload.password, payload.nickname).await {
        Ok(profile) => {
            changes.publish(Table::Profiles, ChangeKind::Insert, &profile).await;
            info!(user_id = %profile.id, "signed up");
            issue(profile, &jwt_cfg)
        }
        Err(ErrorCode::Conflict) => {
            warn!(email = %payload.email, "sign-up with taken email");
            Err(reject(ErrorCode::Conflict, "User already registered"))
        }
        Err(code) => Err(reject(code, "Failed to create account")),
    }
}

pub async fn sign_in(
    Extension(pool): Extension<MySqlPool>,
    Extension(jwt_cfg): Extension<JwtSettings>,
    Json(payload): Json<SignInReq>,
) -> impl IntoResponse {
    if let Err(e) = validate_credentials(&payload.email, &payload.password) {
        return Err(reject(ErrorCode::InvalidInput, e.to_string()));
    }

    match ProfileService::new(pool).sign_in(&payload.email, &payload.password).await {
        Ok(profile) => {
            info!(user_id = %profile.id, "signed in");
            issue(profile, &jwt_cfg)
        }
        Err(ErrorCode::Unauthorized) => Err(reject(ErrorCode::Unauthorized, "Invalid login credentials")),
        Err(code) => Err(reject(code, "Failed to sign in")),
    }
}

/// Deny-lists the presented token until it would have expired.
pub async fn sign_out(
    Extension(redis): Extension<RedisClient>,
    Extension(user): Extension<CurrentUser>,
) -> impl IntoResponse {
    match redis.revoke_token(&user.claims.jti, user.claims.remaining_secs()).await {
        Ok(()) => {
            info!(user_id = %user.id, "signed out");
            Ok(Json(Ack::ok("Signed out")))
        }
        Err(e) => {
            error!(user_id = %user.id, error = %e, "failed to revoke token");
            Err(reject(ErrorCode::Internal, "Failed to sign out"))
        }
    }
}
