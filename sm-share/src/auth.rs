use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// JWT settings
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_expiration_hours")]
    pub expiration_hours: u64,
}

fn default_expiration_hours() -> u64 {
    24
}

/// JWT claims. `jti` identifies the token for revocation on sign-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: &str, expiration_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiration_hours as i64);
        Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().simple().to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Seconds until expiry, never negative.
    pub fn remaining_secs(&self) -> u64 {
        (self.exp - Utc::now().timestamp()).max(0) as u64
    }
}

pub fn generate_token(user_id: &str, jwt_cfg: &JwtSettings) -> Result<String> {
    let claims = Claims::new(user_id, jwt_cfg.expiration_hours);
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_cfg.secret.as_ref()),
    )?;
    Ok(token)
}

pub fn verify_token(token: &str, jwt_cfg: &JwtSettings) -> Result<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_cfg.secret.as_ref()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// Extracts the token from an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str) -> JwtSettings {
        JwtSettings { secret: secret.to_string(), expiration_hours: 1 }
    }

    #[test]
    fn token_round_trips_subject() {
        let cfg = settings("test-secret");
        let token = generate_token("u1", &cfg).unwrap();
        let claims = verify_token(&token, &cfg).unwrap();
        assert_eq!(claims.sub, "u1");
        assert!(claims.remaining_secs() > 3500);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token("u1", &settings("a")).unwrap();
        assert!(verify_token(&token, &settings("b")).is_err());
    }

    #[test]
    fn tokens_get_distinct_ids() {
        let a = Claims::new("u1", 1);
        let b = Claims::new("u1", 1);
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
