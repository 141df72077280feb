use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Question,
    Answer,
    Summary,
    Example,
    QuestionGen,
    ThreadQuestion,
    ThreadAnswer,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Question => "question",
            MessageType::Answer => "answer",
            MessageType::Summary => "summary",
            MessageType::Example => "example",
            MessageType::QuestionGen => "question_gen",
            MessageType::ThreadQuestion => "thread_question",
            MessageType::ThreadAnswer => "thread_answer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "question" => Some(MessageType::Question),
            "answer" => Some(MessageType::Answer),
            "summary" => Some(MessageType::Summary),
            "example" => Some(MessageType::Example),
            "question_gen" => Some(MessageType::QuestionGen),
            "thread_question" => Some(MessageType::ThreadQuestion),
            "thread_answer" => Some(MessageType::ThreadAnswer),
            _ => None,
        }
    }

    /// Written by the student rather than the model.
    pub fn is_from_student(&self) -> bool {
        matches!(self, MessageType::Question | MessageType::ThreadQuestion)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TutorSession {
    pub id: i64,
    pub student_id: i64,
    pub subject_id: Option<i64>,
    pub subject_name: Option<String>,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
    pub is_pinned: bool,
    pub message_count: i64,
}

impl TutorSession {
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            format!("Session from {}", self.started_at.format("%Y-%m-%d %H:%M"))
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TutorMessage {
    pub id: i64,
    pub session_id: i64,
    pub message_type: String,
    pub content: String,
    pub parent_id: Option<i64>,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TutorMessage {
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::parse(&self.message_type)
    }

    pub fn is_from_student(&self) -> bool {
        self.kind().is_some_and(|k| k.is_from_student())
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub subject_id: Option<i64>,
    #[serde(default)]
    pub session_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadReplyRequest {
    pub parent_id: i64,
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct EditMessageRequest {
    pub message_id: i64,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct PracticeRequest {
    pub topic: String,
    #[serde(default = "default_practice_count")]
    pub count: u8,
    #[serde(default)]
    pub subject_id: Option<i64>,
}

fn default_practice_count() -> u8 {
    5
}

const SELECT_SESSION: &str = "\
    SELECT t.id, t.student_id, t.subject_id, s.name AS subject_name, t.title, t.started_at, \
           t.last_activity, t.is_active, t.is_pinned, \
           (SELECT COUNT(*) FROM tutor_messages m WHERE m.session_id = t.id) AS message_count \
    FROM tutor_sessions t \
    LEFT JOIN subjects s ON s.id = t.subject_id";

const SELECT_MESSAGE: &str = "\
    SELECT id, session_id, message_type, content, parent_id, is_edited, edited_at, created_at \
    FROM tutor_messages";

pub async fn find_session(pool: &PgPool, id: i64) -> Result<Option<TutorSession>, sqlx::Error> {
    sqlx::query_as::<_, TutorSession>(&format!("{SELECT_SESSION} WHERE t.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn active_session(pool: &PgPool, student_id: i64) -> Result<Option<TutorSession>, sqlx::Error> {
    sqlx::query_as::<_, TutorSession>(&format!(
        "{SELECT_SESSION} WHERE t.student_id = $1 AND t.is_active \
         ORDER BY t.last_activity DESC LIMIT 1"
    ))
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub async fn create_session(
    pool: &PgPool,
    student_id: i64,
    subject_id: Option<i64>,
    title: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO tutor_sessions (student_id, subject_id, title) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(student_id)
    .bind(subject_id)
    .bind(title)
    .fetch_one(pool)
    .await
}

/// Pinned first, then most recent activity.
pub async fn history(pool: &PgPool, student_id: i64) -> Result<Vec<TutorSession>, sqlx::Error> {
    sqlx::query_as::<_, TutorSession>(&format!(
        "{SELECT_SESSION} WHERE t.student_id = $1 ORDER BY t.is_pinned DESC, t.last_activity DESC"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub async fn add_message(
    pool: &PgPool,
    session_id: i64,
    kind: MessageType,
    content: &str,
    parent_id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO tutor_messages (session_id, message_type, content, parent_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(session_id)
    .bind(kind.as_str())
    .bind(content)
    .bind(parent_id)
    .fetch_one(pool)
    .await?;

    sqlx::query("UPDATE tutor_sessions SET last_activity = NOW() WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(id)
}

pub async fn messages(pool: &PgPool, session_id: i64) -> Result<Vec<TutorMessage>, sqlx::Error> {
    sqlx::query_as::<_, TutorMessage>(&format!(
        "{SELECT_MESSAGE} WHERE session_id = $1 ORDER BY created_at, id"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// The last `limit` top-level exchanges, oldest first, for model context.
pub async fn recent_context(pool: &PgPool, session_id: i64, limit: i64) -> Result<Vec<TutorMessage>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, TutorMessage>(&format!(
        "{SELECT_MESSAGE} WHERE session_id = $1 AND parent_id IS NULL \
         AND message_type IN ('question', 'answer') \
         ORDER BY created_at DESC, id DESC LIMIT $2"
    ))
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}

pub async fn find_message(pool: &PgPool, id: i64) -> Result<Option<TutorMessage>, sqlx::Error> {
    sqlx::query_as::<_, TutorMessage>(&format!("{SELECT_MESSAGE} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Rewrite a question and drop everything said after it in the session.
/// Returns how many later messages were removed.
pub async fn edit_and_truncate(pool: &PgPool, message: &TutorMessage, content: &str) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE tutor_messages SET content = $1, is_edited = TRUE, edited_at = NOW() WHERE id = $2")
        .bind(content)
        .bind(message.id)
        .execute(&mut *tx)
        .await?;

    let removed = sqlx::query(
        "DELETE FROM tutor_messages WHERE session_id = $1 \
         AND (created_at > $2 OR (created_at = $2 AND id > $3))",
    )
    .bind(message.session_id)
    .bind(message.created_at)
    .bind(message.id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    Ok(removed)
}

pub async fn rename(pool: &PgPool, session_id: i64, title: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tutor_sessions SET title = $1 WHERE id = $2")
        .bind(title)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Flip the pin and return the new value.
pub async fn toggle_pin(pool: &PgPool, session_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("UPDATE tutor_sessions SET is_pinned = NOT is_pinned WHERE id = $1 RETURNING is_pinned")
        .bind(session_id)
        .fetch_one(pool)
        .await
}

pub async fn end_session(pool: &PgPool, session_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tutor_sessions SET is_active = FALSE WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_session(pool: &PgPool, session_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM tutor_sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Short session title derived from the opening question.
pub fn title_from_question(question: &str) -> String {
    let trimmed = question.trim();
    let mut title: String = trimmed.chars().take(60).collect();
    if trimmed.chars().count() > 60 {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_round_trips_through_storage_codes() {
        for kind in [
            MessageType::Question,
            MessageType::Answer,
            MessageType::Summary,
            MessageType::Example,
            MessageType::QuestionGen,
            MessageType::ThreadQuestion,
            MessageType::ThreadAnswer,
        ] {
            assert_eq!(MessageType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageType::parse("chat"), None);
    }

    #[test]
    fn titles_are_truncated() {
        assert_eq!(title_from_question("  What is osmosis? "), "What is osmosis?");
        let long = "x".repeat(80);
        let title = title_from_question(&long);
        assert_eq!(title.chars().count(), 63);
        assert!(title.ends_with("..."));
    }
}
