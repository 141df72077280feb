use serde::Deserialize;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct SubjectForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub csrf_token: String,
}

/// How many records reference a subject. Deletion is refused unless all are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct SubjectUsage {
    pub class_assignments: i64,
    pub materials: i64,
    pub assignments: i64,
    pub conferences: i64,
    pub recordings: i64,
    pub quizzes: i64,
}

impl SubjectUsage {
    pub fn total(&self) -> i64 {
        self.class_assignments
            + self.materials
            + self.assignments
            + self.conferences
            + self.recordings
            + self.quizzes
    }

    pub fn is_unused(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero counts as (label, count), for the refusal message.
    pub fn breakdown(&self) -> Vec<(&'static str, i64)> {
        [
            ("class assignments", self.class_assignments),
            ("study materials", self.materials),
            ("assignments", self.assignments),
            ("video conferences", self.conferences),
            ("recorded sessions", self.recordings),
            ("quizzes", self.quizzes),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect()
    }

    pub fn summary(&self) -> String {
        self.breakdown()
            .iter()
            .map(|(label, n)| format!("{n} {label}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    InUse(SubjectUsage),
    NotFound,
}

const SELECT_SUBJECT: &str = "SELECT id, name, description, icon FROM subjects";

const USAGE_SQL: &str = "\
    SELECT \
        (SELECT COUNT(*) FROM class_subjects WHERE subject_id = $1) AS class_assignments, \
        (SELECT COUNT(*) FROM study_materials WHERE subject_id = $1) AS materials, \
        (SELECT COUNT(*) FROM assignments WHERE subject_id = $1) AS assignments, \
        (SELECT COUNT(*) FROM video_conferences WHERE subject_id = $1) AS conferences, \
        (SELECT COUNT(*) FROM recorded_sessions WHERE subject_id = $1) AS recordings, \
        (SELECT COUNT(*) FROM quizzes WHERE subject_id = $1) AS quizzes";

pub async fn find_all(pool: &PgPool) -> Result<Vec<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(&format!("{SELECT_SUBJECT} ORDER BY name"))
        .fetch_all(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(&format!("{SELECT_SUBJECT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Subjects taught in a class level, via class-subject assignments.
pub async fn find_for_class(pool: &PgPool, class_level: &str) -> Result<Vec<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(
        "SELECT s.id, s.name, s.description, s.icon FROM subjects s \
         JOIN class_subjects cs ON cs.subject_id = s.id \
         WHERE cs.class_level = $1 ORDER BY s.name",
    )
    .bind(class_level)
    .fetch_all(pool)
    .await
}

pub async fn create(pool: &PgPool, name: &str, description: &str, icon: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("INSERT INTO subjects (name, description, icon) VALUES ($1, $2, $3) RETURNING id")
        .bind(name)
        .bind(description)
        .bind(icon)
        .fetch_one(pool)
        .await
}

pub async fn update(pool: &PgPool, id: i64, name: &str, description: &str, icon: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE subjects SET name = $1, description = $2, icon = $3 WHERE id = $4")
        .bind(name)
        .bind(description)
        .bind(icon)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn usage(pool: &PgPool, id: i64) -> Result<SubjectUsage, sqlx::Error> {
    sqlx::query_as::<_, SubjectUsage>(USAGE_SQL)
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Delete only when nothing references the subject. The usage check and the
/// delete share a transaction holding a row lock on the subject.
pub async fn delete_if_unused(pool: &PgPool, id: i64) -> Result<DeleteOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM subjects WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Ok(DeleteOutcome::NotFound);
    }

    let counts = sqlx::query_as::<_, SubjectUsage>(USAGE_SQL)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    if !counts.is_unused() {
        return Ok(DeleteOutcome::InUse(counts));
    }

    sqlx::query("DELETE FROM subjects WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(DeleteOutcome::Deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_summary_lists_only_nonzero_counts() {
        let usage = SubjectUsage { materials: 2, conferences: 1, ..Default::default() };
        assert_eq!(usage.total(), 3);
        assert!(!usage.is_unused());
        assert_eq!(usage.summary(), "2 study materials, 1 video conferences");
        assert!(SubjectUsage::default().is_unused());
    }
}
