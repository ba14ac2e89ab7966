use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::MySqlPool;
use tracing::{error, info, warn};
use crate::{
    changes::ChangePublisher,
    error::ErrorCode,
    middleware::auth::CurrentUser,
    service::AccountService,
};
use sm_share::RedisClient;
use sm_share::api::{DeleteAccountReq, DeleteAccountResponse};
use sm_share::model::ChangeKind;

/// Failure classes of account deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// Bad or missing input.
    Validation(String),
    /// The backing store refused the operation.
    Platform(String),
    Unexpected(String),
}

impl AccountError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Platform(_) => StatusCode::BAD_REQUEST,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(m) | Self::Platform(m) | Self::Unexpected(m) => m,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NotFound => Self::Platform("User not found".to_string()),
            ErrorCode::Database => Self::Platform("Failed to delete user data".to_string()),
            ErrorCode::InvalidInput => Self::Validation("Invalid user ID".to_string()),
            _ => Self::Unexpected("An unexpected error occurred".to_string()),
        }
    }
}

/// Checks the request body against the authenticated caller.
pub fn target_user(req: &DeleteAccountReq, caller: &str) -> Result<String, AccountError> {
    let user_id = req
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AccountError::Validation("User ID is required".to_string()))?;
    if user_id != caller {
        return Err(AccountError::Validation("You can only delete your own account".to_string()));
    }
    Ok(user_id.to_string())
}

fn respond(result: Result<(), AccountError>) -> (StatusCode, Json<DeleteAccountResponse>) {
    match result {
        Ok(()) => (StatusCode::OK, Json(DeleteAccountResponse::ok())),
        Err(e) => (e.status(), Json(DeleteAccountResponse::failed(e.message()))),
    }
}

/// `POST /api/delete-account {"userId"}`: 200 `{"success": true}`, 400 or 500 `{"error"}`.
pub async fn delete_account(
    Extension(pool): Extension<MySqlPool>,
    Extension(redis): Extension<RedisClient>,
    Extension(changes): Extension<ChangePublisher>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<DeleteAccountReq>,
) -> impl IntoResponse {
    let user_id = match target_user(&payload, &user.id) {
        Ok(id) => id,
        Err(e) => {
            warn!(caller = %user.id, requested = ?payload.user_id, error = %e.message(), "delete-account rejected");
            return respond(Err(e));
        }
    };

    match AccountService::new(pool).delete(&user_id).await {
        Ok(deletion) => {
            if let Err(e) = redis.revoke_token(&user.claims.jti, user.claims.remaining_secs()).await {
                warn!(user_id = %user_id, error = %e, "account deleted but token revocation failed");
            }
            for (table, record) in deletion.events(&user_id) {
                changes.publish(table, ChangeKind::Delete, &record).await;
            }
            info!(user_id = %user_id, report = ?deletion.report, "delete-account done");
            respond(Ok(()))
        }
        Err(code) => {
            let e = AccountError::from_code(code);
            error!(user_id = %user_id, error = %code, "delete-account failed");
            respond(Err(e))
        }
    }
}
