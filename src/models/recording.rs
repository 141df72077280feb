use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::policy::{ClassScoped, ListScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Url,
    S3,
    Zoom,
}

impl StorageType {
    pub fn parse(s: &str) -> Self {
        match s {
            "s3" => StorageType::S3,
            "zoom" => StorageType::Zoom,
            _ => StorageType::Url,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Url => "url",
            StorageType::S3 => "s3",
            StorageType::Zoom => "zoom",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Recording {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub class_level: String,
    pub recording_url: String,
    pub thumbnail_url: String,
    pub uploaded_by: i64,
    pub uploaded_by_name: String,
    pub duration_minutes: i32,
    pub recorded_date: DateTime<Utc>,
    pub views: i32,
    pub storage_type: String,
    pub s3_object_key: String,
    pub file_size_mb: f64,
    pub conference_id: Option<i64>,
}

impl ClassScoped for Recording {
    fn class_level(&self) -> &str {
        &self.class_level
    }
    fn owner_id(&self) -> i64 {
        self.uploaded_by
    }
}

impl Recording {
    pub fn class_label(&self) -> String {
        crate::models::class_level::label(&self.class_level)
    }

    pub fn storage(&self) -> StorageType {
        StorageType::parse(&self.storage_type)
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordingForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    #[serde(default)]
    pub recording_url: String,
    #[serde(default)]
    pub s3_object_key: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub duration_minutes: i32,
    /// `datetime-local`; defaults to now when blank.
    #[serde(default)]
    pub recorded_date: String,
    pub csrf_token: String,
}

pub struct NewRecording {
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub recording_url: String,
    pub thumbnail_url: String,
    pub uploaded_by: i64,
    pub duration_minutes: i32,
    pub recorded_date: DateTime<Utc>,
    pub storage_type: StorageType,
    pub s3_object_key: String,
    pub file_size_mb: f64,
    pub conference_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordingFilter {
    pub q: Option<String>,
    pub subject: Option<i64>,
    pub class_level: Option<String>,
}

const SELECT_RECORDING: &str = "\
    SELECT r.id, r.title, r.description, r.subject_id, s.name AS subject_name, r.class_level, \
           r.recording_url, r.thumbnail_url, r.uploaded_by, \
           COALESCE(NULLIF(u.display_name, ''), u.username) AS uploaded_by_name, \
           r.duration_minutes, r.recorded_date, r.views, r.storage_type, r.s3_object_key, \
           r.file_size_mb, r.conference_id \
    FROM recorded_sessions r \
    JOIN subjects s ON s.id = r.subject_id \
    JOIN users u ON u.id = r.uploaded_by";

pub async fn find_visible(
    pool: &PgPool,
    scope: &ListScope,
    filter: &RecordingFilter,
) -> Result<Vec<Recording>, sqlx::Error> {
    let search = filter
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));
    let class_filter = filter.class_level.as_deref().filter(|c| !c.is_empty());

    sqlx::query_as::<_, Recording>(&format!(
        "{SELECT_RECORDING} WHERE {} \
         AND ($4::text IS NULL OR r.title ILIKE $4 OR r.description ILIKE $4) \
         AND ($5::bigint IS NULL OR r.subject_id = $5) \
         AND ($6::text IS NULL OR r.class_level = $6) \
         ORDER BY r.recorded_date DESC",
        ListScope::predicate("r", "uploaded_by")
    ))
    .bind(scope.mode())
    .bind(scope.class_level())
    .bind(scope.user_id())
    .bind(search)
    .bind(filter.subject)
    .bind(class_filter)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Recording>, sqlx::Error> {
    sqlx::query_as::<_, Recording>(&format!("{SELECT_RECORDING} WHERE r.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, new: &NewRecording) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO recorded_sessions (title, description, subject_id, class_level, recording_url, \
             thumbnail_url, uploaded_by, duration_minutes, recorded_date, storage_type, s3_object_key, \
             file_size_mb, conference_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(&new.recording_url)
    .bind(&new.thumbnail_url)
    .bind(new.uploaded_by)
    .bind(new.duration_minutes)
    .bind(new.recorded_date)
    .bind(new.storage_type.as_str())
    .bind(&new.s3_object_key)
    .bind(new.file_size_mb)
    .bind(new.conference_id)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: i64, new: &NewRecording) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE recorded_sessions SET title = $1, description = $2, subject_id = $3, class_level = $4, \
             recording_url = $5, thumbnail_url = $6, duration_minutes = $7, recorded_date = $8, \
             storage_type = $9, s3_object_key = $10 \
         WHERE id = $11",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(&new.recording_url)
    .bind(&new.thumbnail_url)
    .bind(new.duration_minutes)
    .bind(new.recorded_date)
    .bind(new.storage_type.as_str())
    .bind(&new.s3_object_key)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM recorded_sessions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn increment_views(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE recorded_sessions SET views = views + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_visible(pool: &PgPool, scope: &ListScope) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM recorded_sessions r WHERE {}",
        ListScope::predicate("r", "uploaded_by")
    ))
    .bind(scope.mode())
    .bind(scope.class_level())
    .bind(scope.user_id())
    .fetch_one(pool)
    .await
}
