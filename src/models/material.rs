use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::policy::{ClassScoped, ListScope};

pub const FILE_TYPES: &[(&str, &str)] = &[
    ("pdf", "PDF Document"),
    ("doc", "Word Document"),
    ("ppt", "Presentation"),
    ("img", "Image"),
    ("vid", "Video"),
    ("aud", "Audio"),
    ("other", "Other"),
];

/// Guess the file type from an extension, for forms that leave it blank.
pub fn file_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "pdf",
        "doc" | "docx" | "odt" | "txt" => "doc",
        "ppt" | "pptx" | "odp" => "ppt",
        "png" | "jpg" | "jpeg" | "gif" | "webp" => "img",
        "mp4" | "mov" | "webm" | "mkv" => "vid",
        "mp3" | "wav" | "ogg" | "m4a" => "aud",
        _ => "other",
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Material {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub class_level: String,
    pub file_type: String,
    pub file_url: String,
    pub storage_key: Option<String>,
    pub file_size: i64,
    pub uploaded_by: i64,
    pub uploaded_by_name: String,
    pub views: i32,
    pub downloads: i32,
    pub created_at: DateTime<Utc>,
}

impl ClassScoped for Material {
    fn class_level(&self) -> &str {
        &self.class_level
    }
    fn owner_id(&self) -> i64 {
        self.uploaded_by
    }
}

impl Material {
    pub fn class_label(&self) -> String {
        crate::models::class_level::label(&self.class_level)
    }

    pub fn file_type_label(&self) -> &'static str {
        FILE_TYPES
            .iter()
            .find(|(code, _)| *code == self.file_type)
            .map(|(_, label)| *label)
            .unwrap_or("Other")
    }
}

#[derive(Debug, Deserialize)]
pub struct MaterialForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub storage_key: String,
    #[serde(default)]
    pub file_size: i64,
    pub csrf_token: String,
}

pub struct NewMaterial {
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub file_type: String,
    pub file_url: String,
    pub storage_key: Option<String>,
    pub file_size: i64,
    pub uploaded_by: i64,
}

/// Query-string filters on the list page.
#[derive(Debug, Default, Deserialize)]
pub struct MaterialFilter {
    pub q: Option<String>,
    pub subject: Option<i64>,
    pub class_level: Option<String>,
    pub file_type: Option<String>,
}

const SELECT_MATERIAL: &str = "\
    SELECT m.id, m.title, m.description, m.subject_id, s.name AS subject_name, m.class_level, \
           m.file_type, m.file_url, m.storage_key, m.file_size, m.uploaded_by, \
           COALESCE(NULLIF(u.display_name, ''), u.username) AS uploaded_by_name, \
           m.views, m.downloads, m.created_at \
    FROM study_materials m \
    JOIN subjects s ON s.id = m.subject_id \
    JOIN users u ON u.id = m.uploaded_by";

pub async fn find_visible(
    pool: &PgPool,
    scope: &ListScope,
    filter: &MaterialFilter,
) -> Result<Vec<Material>, sqlx::Error> {
    let search = filter
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));
    let class_filter = filter.class_level.as_deref().filter(|c| !c.is_empty());
    let type_filter = filter.file_type.as_deref().filter(|t| !t.is_empty());

    let sql = format!(
        "{SELECT_MATERIAL} WHERE {} \
         AND ($4::text IS NULL OR m.title ILIKE $4 OR m.description ILIKE $4) \
         AND ($5::bigint IS NULL OR m.subject_id = $5) \
         AND ($6::text IS NULL OR m.class_level = $6) \
         AND ($7::text IS NULL OR m.file_type = $7) \
         ORDER BY m.created_at DESC",
        ListScope::predicate("m", "uploaded_by")
    );

    sqlx::query_as::<_, Material>(&sql)
        .bind(scope.mode())
        .bind(scope.class_level())
        .bind(scope.user_id())
        .bind(search)
        .bind(filter.subject)
        .bind(class_filter)
        .bind(type_filter)
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Material>, sqlx::Error> {
    sqlx::query_as::<_, Material>(&format!("{SELECT_MATERIAL} WHERE m.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, new: &NewMaterial) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO study_materials (title, description, subject_id, class_level, file_type, file_url, \
             storage_key, file_size, uploaded_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(&new.file_type)
    .bind(&new.file_url)
    .bind(&new.storage_key)
    .bind(new.file_size)
    .bind(new.uploaded_by)
    .fetch_one(pool)
    .await
}

pub async fn increment_views(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE study_materials SET views = views + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn increment_downloads(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE study_materials SET downloads = downloads + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn count_visible(pool: &PgPool, scope: &ListScope) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM study_materials m WHERE {}",
        ListScope::predicate("m", "uploaded_by")
    ))
    .bind(scope.mode())
    .bind(scope.class_level())
    .bind(scope.user_id())
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_file_type_from_extension() {
        assert_eq!(file_type_for("notes/chapter1.PDF"), "pdf");
        assert_eq!(file_type_for("slides.pptx"), "ppt");
        assert_eq!(file_type_for("clip.mp4"), "vid");
        assert_eq!(file_type_for("archive"), "other");
    }
}
