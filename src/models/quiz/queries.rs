use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::auth::policy::ListScope;
use super::types::*;

const SELECT_QUIZ: &str = "\
    SELECT q.id, q.title, q.description, q.subject_id, s.name AS subject_name, q.class_level, \
           q.created_by, COALESCE(NULLIF(u.display_name, ''), u.username) AS created_by_name, \
           q.time_limit, q.passing_score, q.is_active, q.created_at, \
           (SELECT COUNT(*) FROM quiz_questions qq WHERE qq.quiz_id = q.id) AS question_count \
    FROM quizzes q \
    JOIN subjects s ON s.id = q.subject_id \
    JOIN users u ON u.id = q.created_by";

const SELECT_QUESTION: &str = "\
    SELECT id, quiz_id, question_number, question_text, option_a, option_b, option_c, option_d, \
           correct_option, explanation \
    FROM quiz_questions";

const SELECT_ATTEMPT: &str = "\
    SELECT id, quiz_id, student_id, started_at, completed_at, completed, score FROM quiz_attempts";

/// Quizzes in scope. `$4` restricts to active quizzes (students only see active ones).
pub async fn find_visible(pool: &PgPool, scope: &ListScope, active_only: bool) -> Result<Vec<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "{SELECT_QUIZ} WHERE {} AND (NOT $4 OR q.is_active) ORDER BY q.created_at DESC",
        ListScope::predicate("q", "created_by")
    ))
    .bind(scope.mode())
    .bind(scope.class_level())
    .bind(scope.user_id())
    .bind(active_only)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("{SELECT_QUIZ} WHERE q.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, new: &NewQuiz) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO quizzes (title, description, subject_id, class_level, created_by, time_limit, passing_score) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(new.created_by)
    .bind(new.time_limit)
    .bind(new.passing_score)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: i64, new: &NewQuiz, is_active: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quizzes SET title = $1, description = $2, subject_id = $3, class_level = $4, \
             time_limit = $5, passing_score = $6, is_active = $7 \
         WHERE id = $8",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(new.time_limit)
    .bind(new.passing_score)
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn questions(pool: &PgPool, quiz_id: i64) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "{SELECT_QUESTION} WHERE quiz_id = $1 ORDER BY question_number"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

pub async fn find_question(pool: &PgPool, id: i64) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("{SELECT_QUESTION} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Append questions after the current highest number. The quiz row is locked
/// so concurrent appends cannot take the same number.
pub async fn add_questions(pool: &PgPool, quiz_id: i64, new: &[NewQuestion]) -> Result<Vec<i64>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM quizzes WHERE id = $1 FOR UPDATE")
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;

    let mut next: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(question_number), 0) + 1 FROM quiz_questions WHERE quiz_id = $1",
    )
    .bind(quiz_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut ids = Vec::with_capacity(new.len());
    for q in new {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO quiz_questions (quiz_id, question_number, question_text, option_a, option_b, \
                 option_c, option_d, correct_option, explanation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
        )
        .bind(quiz_id)
        .bind(next)
        .bind(&q.question_text)
        .bind(&q.option_a)
        .bind(&q.option_b)
        .bind(&q.option_c)
        .bind(&q.option_d)
        .bind(&q.correct_option)
        .bind(&q.explanation)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
        next += 1;
    }

    tx.commit().await?;
    Ok(ids)
}

pub async fn find_attempt(pool: &PgPool, id: i64) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("{SELECT_ATTEMPT} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_open_attempt(pool: &PgPool, quiz_id: i64, student_id: i64) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "{SELECT_ATTEMPT} WHERE quiz_id = $1 AND student_id = $2 AND completed = FALSE"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

/// Insert an in-progress attempt. Returns None when one already exists.
pub async fn insert_open_attempt(
    pool: &PgPool,
    quiz_id: i64,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(
        "INSERT INTO quiz_attempts (quiz_id, student_id, started_at) VALUES ($1, $2, $3) \
         ON CONFLICT (quiz_id, student_id) WHERE completed = FALSE DO NOTHING \
         RETURNING id, quiz_id, student_id, started_at, completed_at, completed, score",
    )
    .bind(quiz_id)
    .bind(student_id)
    .bind(now)
    .fetch_optional(pool)
    .await
}

/// Latest answer wins. Refuses to write once the attempt is completed.
pub async fn upsert_response(
    pool: &PgPool,
    attempt_id: i64,
    question_id: i64,
    option: &str,
) -> Result<bool, sqlx::Error> {
    let written: Option<i64> = sqlx::query_scalar(
        "INSERT INTO quiz_responses (attempt_id, question_id, selected_option) \
         SELECT $1, $2, $3 FROM quiz_attempts WHERE id = $1 AND completed = FALSE \
         ON CONFLICT (attempt_id, question_id) \
         DO UPDATE SET selected_option = EXCLUDED.selected_option, answered_at = NOW() \
         RETURNING id",
    )
    .bind(attempt_id)
    .bind(question_id)
    .bind(option)
    .fetch_optional(pool)
    .await?;
    Ok(written.is_some())
}

pub async fn answers(pool: &PgPool, attempt_id: i64) -> Result<HashMap<i64, String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, Response>(
        "SELECT question_id, selected_option FROM quiz_responses WHERE attempt_id = $1",
    )
    .bind(attempt_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| (r.question_id, r.selected_option)).collect())
}

/// Flip an attempt to completed. Returns false when it was already completed.
pub async fn complete_attempt(
    pool: &PgPool,
    attempt_id: i64,
    score: i32,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let updated: Option<i64> = sqlx::query_scalar(
        "UPDATE quiz_attempts SET completed = TRUE, completed_at = $1, score = $2 \
         WHERE id = $3 AND completed = FALSE RETURNING id",
    )
    .bind(now)
    .bind(score)
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?;
    Ok(updated.is_some())
}

/// Latest completed attempt per quiz for a student.
pub async fn completed_for_student(pool: &PgPool, student_id: i64) -> Result<Vec<CompletedQuiz>, sqlx::Error> {
    sqlx::query_as::<_, CompletedQuiz>(
        "SELECT DISTINCT ON (a.quiz_id) a.quiz_id, a.id AS attempt_id, q.title, s.name AS subject_name, \
                COALESCE(a.score, 0) AS score, q.passing_score, a.completed_at \
         FROM quiz_attempts a \
         JOIN quizzes q ON q.id = a.quiz_id \
         JOIN subjects s ON s.id = q.subject_id \
         WHERE a.student_id = $1 AND a.completed = TRUE AND a.completed_at IS NOT NULL \
         ORDER BY a.quiz_id, a.completed_at DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub async fn attempts_for_student(pool: &PgPool, quiz_id: i64, student_id: i64) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "{SELECT_ATTEMPT} WHERE quiz_id = $1 AND student_id = $2 ORDER BY started_at DESC"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_all(pool)
    .await
}

pub async fn stats(pool: &PgPool, quiz_id: i64) -> Result<QuizStats, sqlx::Error> {
    sqlx::query_as::<_, QuizStats>(
        "SELECT COUNT(*) AS completions, AVG(a.score)::float8 AS average_score, \
                COUNT(*) FILTER (WHERE a.score >= q.passing_score) AS pass_count \
         FROM quiz_attempts a JOIN quizzes q ON q.id = a.quiz_id \
         WHERE a.quiz_id = $1 AND a.completed = TRUE",
    )
    .bind(quiz_id)
    .fetch_one(pool)
    .await
}
