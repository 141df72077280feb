use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::types::*;

const SELECT_USER: &str = "\
    SELECT id, username, email, password_hash, display_name, role, class_level, bio, \
           phone_number, is_active, payment_status, payment_date, payment_amount, payment_id, \
           created_at, last_login \
    FROM users";

const SELECT_SUMMARY: &str = "\
    SELECT id, username, display_name, email, role, class_level, is_active, payment_status, created_at \
    FROM users";

pub async fn create(pool: &PgPool, new: &NewUser) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, display_name, role, class_level, payment_status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(&new.username)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(&new.display_name)
    .bind(new.role.as_str())
    .bind(&new.class_level)
    .bind(new.payment_status.as_str())
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Active accounts registered with `email`, compared case-insensitively.
pub async fn find_active_by_email(pool: &PgPool, email: &str) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "{SELECT_USER} WHERE LOWER(email) = LOWER($1) AND email <> '' AND is_active = TRUE ORDER BY id"
    ))
    .bind(email)
    .fetch_all(pool)
    .await
}

pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
        .bind(username)
        .fetch_one(pool)
        .await
}

pub async fn find_all(pool: &PgPool, role_filter: Option<&str>) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(&format!(
        "{SELECT_SUMMARY} WHERE ($1::text IS NULL OR role = $1) ORDER BY role, username"
    ))
    .bind(role_filter)
    .fetch_all(pool)
    .await
}

/// Active accounts in one class level, optionally restricted to one role.
pub async fn find_in_class(
    pool: &PgPool,
    class_level: &str,
    role: Option<Role>,
) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(&format!(
        "{SELECT_SUMMARY} WHERE class_level = $1 AND is_active = TRUE \
         AND ($2::text IS NULL OR role = $2) ORDER BY display_name, username"
    ))
    .bind(class_level)
    .bind(role.map(|r| r.as_str()))
    .fetch_all(pool)
    .await
}

/// Active students of `class_level` among `requested`; an empty request
/// means the whole class. Ids outside the class are left out.
pub async fn class_student_ids(
    pool: &PgPool,
    class_level: &str,
    requested: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT id FROM users \
         WHERE role = 'student' AND is_active = TRUE AND class_level = $1 \
         AND (cardinality($2::bigint[]) = 0 OR id = ANY($2)) \
         ORDER BY id",
    )
    .bind(class_level)
    .bind(requested)
    .fetch_all(pool)
    .await
}

pub async fn find_active_students(pool: &PgPool) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(&format!(
        "{SELECT_SUMMARY} WHERE role = 'student' AND is_active = TRUE ORDER BY username"
    ))
    .fetch_all(pool)
    .await
}

pub async fn find_by_ids(pool: &PgPool, ids: &[i64]) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(&format!(
        "{SELECT_SUMMARY} WHERE id = ANY($1) AND is_active = TRUE ORDER BY username"
    ))
    .bind(ids)
    .fetch_all(pool)
    .await
}

pub async fn update_profile(
    pool: &PgPool,
    id: i64,
    display_name: &str,
    email: &str,
    bio: &str,
    phone_number: &str,
    class_level: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET display_name = $1, email = $2, bio = $3, phone_number = $4, class_level = $5 \
         WHERE id = $6",
    )
    .bind(display_name)
    .bind(email)
    .bind(bio)
    .bind(phone_number)
    .bind(class_level)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_role(
    pool: &PgPool,
    id: i64,
    role: Role,
    class_level: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET role = $1, class_level = $2 WHERE id = $3")
        .bind(role.as_str())
        .bind(class_level)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Flip `is_active` and return the new value.
pub async fn toggle_active(pool: &PgPool, id: i64) -> Result<Option<bool>, sqlx::Error> {
    sqlx::query_scalar("UPDATE users SET is_active = NOT is_active WHERE id = $1 RETURNING is_active")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record a settled payment. Returns false when the account was already
/// paid, so concurrent confirmations write (and notify) once.
pub async fn mark_paid(
    pool: &PgPool,
    id: i64,
    amount: i64,
    payment_id: &str,
    paid_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET payment_status = 'paid', payment_amount = $1, payment_id = $2, payment_date = $3 \
         WHERE id = $4 AND payment_status <> 'paid'",
    )
    .bind(amount)
    .bind(payment_id)
    .bind(paid_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_payment_status(pool: &PgPool, id: i64, status: PaymentStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET payment_status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Counts per role for the admin dashboard: (students, teachers, admins).
pub async fn count_by_role(pool: &PgPool) -> Result<(i64, i64, i64), sqlx::Error> {
    let row: (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*) FILTER (WHERE role = 'student'), \
                COUNT(*) FILTER (WHERE role = 'teacher'), \
                COUNT(*) FILTER (WHERE role = 'admin') \
         FROM users",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}
