use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClassSubject {
    pub id: i64,
    pub class_level: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub assigned_by: Option<i64>,
    pub assigned_by_name: String,
    pub created_at: DateTime<Utc>,
}

impl ClassSubject {
    pub fn class_label(&self) -> String {
        crate::models::class_level::label(&self.class_level)
    }
}

#[derive(Debug, Deserialize)]
pub struct ClassSubjectForm {
    pub class_level: String,
    pub subject_id: i64,
    pub csrf_token: String,
}

const SELECT_CLASS_SUBJECT: &str = "\
    SELECT cs.id, cs.class_level, cs.subject_id, s.name AS subject_name, cs.assigned_by, \
           COALESCE(NULLIF(u.display_name, ''), u.username, '') AS assigned_by_name, cs.created_at \
    FROM class_subjects cs \
    JOIN subjects s ON s.id = cs.subject_id \
    LEFT JOIN users u ON u.id = cs.assigned_by";

/// All assignments, or only those made by `assigned_by`.
pub async fn find_all(pool: &PgPool, assigned_by: Option<i64>) -> Result<Vec<ClassSubject>, sqlx::Error> {
    sqlx::query_as::<_, ClassSubject>(&format!(
        "{SELECT_CLASS_SUBJECT} WHERE ($1::bigint IS NULL OR cs.assigned_by = $1) \
         ORDER BY cs.class_level, s.name"
    ))
    .bind(assigned_by)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<ClassSubject>, sqlx::Error> {
    sqlx::query_as::<_, ClassSubject>(&format!("{SELECT_CLASS_SUBJECT} WHERE cs.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Returns the new id, or None when the pair already exists.
pub async fn create(
    pool: &PgPool,
    class_level: &str,
    subject_id: i64,
    assigned_by: i64,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO class_subjects (class_level, subject_id, assigned_by) VALUES ($1, $2, $3) \
         ON CONFLICT (class_level, subject_id) DO NOTHING RETURNING id",
    )
    .bind(class_level)
    .bind(subject_id)
    .bind(assigned_by)
    .fetch_optional(pool)
    .await
}

pub async fn update(pool: &PgPool, id: i64, class_level: &str, subject_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE class_subjects SET class_level = $1, subject_id = $2 WHERE id = $3")
        .bind(class_level)
        .bind(subject_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM class_subjects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn is_assigned(pool: &PgPool, class_level: &str, subject_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM class_subjects WHERE class_level = $1 AND subject_id = $2)",
    )
    .bind(class_level)
    .bind(subject_id)
    .fetch_one(pool)
    .await
}
