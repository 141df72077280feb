use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

/// Token lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OAuthToken {
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub scope: String,
}

impl OAuthToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub fn expires_at(now: DateTime<Utc>, expires_in: Option<i64>) -> DateTime<Utc> {
    now + Duration::seconds(expires_in.unwrap_or(DEFAULT_EXPIRES_IN))
}

pub async fn find_for_user(pool: &PgPool, user_id: i64) -> Result<Option<OAuthToken>, sqlx::Error> {
    sqlx::query_as::<_, OAuthToken>(
        "SELECT user_id, access_token, refresh_token, token_type, expires_at, scope \
         FROM oauth_tokens WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn save(pool: &PgPool, token: &OAuthToken) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO oauth_tokens (user_id, access_token, refresh_token, token_type, expires_at, scope) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (user_id) DO UPDATE SET access_token = EXCLUDED.access_token, \
             refresh_token = EXCLUDED.refresh_token, token_type = EXCLUDED.token_type, \
             expires_at = EXCLUDED.expires_at, scope = EXCLUDED.scope, updated_at = NOW()",
    )
    .bind(token.user_id)
    .bind(&token.access_token)
    .bind(&token.refresh_token)
    .bind(&token.token_type)
    .bind(token.expires_at)
    .bind(&token.scope)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_for_user(pool: &PgPool, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM oauth_tokens WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_is_inclusive_and_defaults_to_an_hour() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let token = OAuthToken {
            user_id: 1,
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_type: "bearer".into(),
            expires_at: expires_at(now, None),
            scope: String::new(),
        };
        assert!(!token.is_expired(now + Duration::seconds(3599)));
        assert!(token.is_expired(now + Duration::seconds(3600)));
    }
}
