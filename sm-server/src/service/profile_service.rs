use crate::db::is_unique_violation;
use crate::error::{ErrorCode, Result, db_error};
use crate::model::Account;
use bcrypt::{DEFAULT_COST, hash, verify};
use sm_share::api::UpdateProfileReq;
use sm_share::model::Profile;
use sm_share::now_timestamp;
use sqlx::MySqlPool;
use tracing::{info, warn};
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "id, nickname, email, avatar_url, created_at, updated_at";

/// Trimmed nickname, or `None` when nothing is left.
pub fn clean_nickname(nickname: Option<&str>) -> Option<&str> {
    nickname.map(str::trim).filter(|n| !n.is_empty())
}

pub struct ProfileService {
    pool: MySqlPool,
}

impl ProfileService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates an account. `Conflict` when the email is taken.
    pub async fn sign_up(&self, email: &str, password: &str, nickname: Option<String>) -> Result<Profile> {
        let email = email.trim().to_lowercase();
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles WHERE email = ?")
            .bind(&email)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        if exists > 0 {
            return Err(ErrorCode::Conflict);
        }

        let password_hash = hash(password, DEFAULT_COST).map_err(|e| {
            warn!(error = %e, "password hashing failed");
            ErrorCode::Internal
        })?;
        let now = now_timestamp();
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            nickname: clean_nickname(nickname.as_deref()).map(str::to_string),
            email,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO profiles (id, nickname, email, password_hash, avatar_url, created_at, updated_at)
             VALUES (?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.nickname)
        .bind(&profile.email)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| if is_unique_violation(&e) { ErrorCode::Conflict } else { db_error(e) })?;

        info!(user_id = %profile.id, "profile created");
        Ok(profile)
    }

    /// Checks credentials. `Unauthorized` for an unknown email or a wrong password alike.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, nickname, email, password_hash, avatar_url, created_at, updated_at
             FROM profiles WHERE email = ?",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or(ErrorCode::Unauthorized)?;

        match verify(password, &account.password_hash) {
            Ok(true) => Ok(account.into_profile()),
            Ok(false) => Err(ErrorCode::Unauthorized),
            Err(e) => {
                warn!(user_id = %account.id, error = %e, "stored password hash unreadable");
                Err(ErrorCode::Internal)
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Profile> {
        sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(ErrorCode::NotFound)
    }

    /// Updates the given fields, leaving absent ones alone.
    pub async fn update(&self, id: &str, req: &UpdateProfileReq) -> Result<Profile> {
        let nickname = clean_nickname(req.nickname.as_deref());
        sqlx::query(
            "UPDATE profiles
             SET nickname = COALESCE(?, nickname), avatar_url = COALESCE(?, avatar_url), updated_at = ?
             WHERE id = ?",
        )
        .bind(nickname)
        .bind(req.avatar_url.as_deref())
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        self.get(id).await
    }

    /// Everyone except the viewer and the viewer's friends, newest accounts first.
    pub async fn recommended(&self, viewer: &str) -> Result<Vec<Profile>> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p
             WHERE p.id <> ?
               AND NOT EXISTS (
                   SELECT 1 FROM friendships f
                   WHERE (f.user_id = ? AND f.friend_id = p.id) OR (f.friend_id = ? AND f.user_id = p.id)
               )
             ORDER BY p.created_at DESC"
        ))
        .bind(viewer)
        .bind(viewer)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_nicknames_become_null() {
        assert_eq!(clean_nickname(Some("  neo ")), Some("neo"));
        assert_eq!(clean_nickname(Some("   ")), None);
        assert_eq!(clean_nickname(Some("")), None);
        assert_eq!(clean_nickname(None), None);
    }
}
