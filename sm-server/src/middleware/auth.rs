use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use sm_share::{Claims, JwtSettings, RedisClient, bearer_token, verify_token};
use tracing::{error, warn};

/// The authenticated caller, inserted into request extensions.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: String,
    pub claims: Claims,
}

pub async fn auth_middleware(
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let jwt_cfg = request
        .extensions()
        .get::<JwtSettings>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let redis = request
        .extensions()
        .get::<RedisClient>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let claims = verify_token(&token, &jwt_cfg).map_err(|e| {
        warn!(error = %e, "rejected token");
        StatusCode::UNAUTHORIZED
    })?;

    match redis.is_token_revoked(&claims.jti).await {
        Ok(false) => {}
        Ok(true) => {
            warn!(user_id = %claims.sub, "revoked token presented");
            return Err(StatusCode::UNAUTHORIZED);
        }
        Err(e) => {
            error!(error = %e, "token revocation check failed");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    request.extensions_mut().insert(CurrentUser { id: claims.sub.clone(), claims });

    Ok(next.run(request).await)
}
