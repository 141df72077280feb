//! Emailed password reset links. The raw token only ever exists in the
//! email; the table keeps its SHA-256.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::auth::csrf;
use crate::config::defaults;

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a reset token for `user_id` and return the raw value to email.
pub async fn issue(pool: &PgPool, user_id: i64, now: DateTime<Utc>) -> Result<String, sqlx::Error> {
    let token = csrf::generate_token();
    sqlx::query("INSERT INTO password_reset_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(hash_token(&token))
        .bind(now + Duration::hours(defaults::PASSWORD_RESET_TTL_HOURS))
        .execute(pool)
        .await?;
    Ok(token)
}

/// The active account an unused, unexpired token belongs to.
pub async fn find_valid(pool: &PgPool, token: &str, now: DateTime<Utc>) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT t.user_id FROM password_reset_tokens t JOIN users u ON u.id = t.user_id \
         WHERE t.token_hash = $1 AND t.used_at IS NULL AND t.expires_at > $2 AND u.is_active = TRUE",
    )
    .bind(hash_token(token))
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Spend the token and set the new password hash in one transaction. Every
/// other outstanding link for the account dies with it. `None` when the
/// token is unknown, used, expired or its account is inactive.
pub async fn redeem(
    pool: &PgPool,
    token: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let user_id: Option<i64> = sqlx::query_scalar(
        "UPDATE password_reset_tokens SET used_at = $2 \
         WHERE token_hash = $1 AND used_at IS NULL AND expires_at > $2 \
         RETURNING user_id",
    )
    .bind(hash_token(token))
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(user_id) = user_id else {
        return Ok(None);
    };

    let updated = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2 AND is_active = TRUE")
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Ok(None);
    }

    sqlx::query("UPDATE password_reset_tokens SET used_at = $2 WHERE user_id = $1 AND used_at IS NULL")
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Some(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hash_is_stable_hex() {
        let h = hash_token("abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_token("abc"));
        assert_ne!(h, hash_token("abd"));
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }
}
