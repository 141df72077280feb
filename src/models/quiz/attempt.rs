//! Attempt lifecycle: not started -> in progress -> completed.

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::auth::validate::is_valid_option;
use super::queries;
use super::scoring;
use super::types::{Attempt, Quiz, QuizOutcome};

#[derive(Debug)]
pub enum AttemptError {
    NotFound,
    NotOwner,
    AlreadyCompleted,
    QuestionNotInQuiz,
    InvalidOption(String),
    Db(sqlx::Error),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::NotFound => write!(f, "Quiz attempt not found"),
            AttemptError::NotOwner => write!(f, "Unauthorized"),
            AttemptError::AlreadyCompleted => write!(f, "Quiz attempt already completed"),
            AttemptError::QuestionNotInQuiz => write!(f, "Question does not belong to this quiz"),
            AttemptError::InvalidOption(o) => write!(f, "Invalid option '{o}'"),
            AttemptError::Db(e) => write!(f, "Database error: {e}"),
        }
    }
}

impl From<sqlx::Error> for AttemptError {
    fn from(e: sqlx::Error) -> Self {
        AttemptError::Db(e)
    }
}

#[derive(Debug)]
pub enum BeginOutcome {
    Started(Attempt),
    Resumed(Attempt),
    /// The open attempt ran past the time limit and was submitted with its saved answers.
    TimedOut { attempt_id: i64, score: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub score: i32,
    pub passed: bool,
}

/// Return the student's open attempt, creating one if needed. An open attempt
/// past its time limit is auto-submitted instead of being resumed.
pub async fn begin_or_resume(
    pool: &PgPool,
    quiz: &Quiz,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<BeginOutcome, AttemptError> {
    if let Some(open) = queries::find_open_attempt(pool, quiz.id, student_id).await? {
        if scoring::is_expired(open.started_at, quiz.time_limit, now) {
            let done = finish(pool, &open, quiz, now).await?;
            log::info!(
                "Quiz {} attempt {} by user {} timed out with score {}",
                quiz.id, open.id, student_id, done.score
            );
            return Ok(BeginOutcome::TimedOut { attempt_id: open.id, score: done.score });
        }
        return Ok(BeginOutcome::Resumed(open));
    }

    match queries::insert_open_attempt(pool, quiz.id, student_id, now).await? {
        Some(created) => Ok(BeginOutcome::Started(created)),
        // Lost a race with a concurrent first visit; use the winner's row.
        None => queries::find_open_attempt(pool, quiz.id, student_id)
            .await?
            .map(BeginOutcome::Resumed)
            .ok_or(AttemptError::NotFound),
    }
}

#[derive(Debug)]
pub enum Saved {
    Recorded,
    /// The answer arrived after the time limit; the attempt was submitted
    /// with the answers saved before it.
    TimedOut(Submitted),
}

/// Record an answer on the caller's open attempt, or close the attempt when
/// it has already run past its time limit.
pub async fn save_response(
    pool: &PgPool,
    attempt_id: i64,
    student_id: i64,
    question_id: i64,
    option: &str,
    now: DateTime<Utc>,
) -> Result<Saved, AttemptError> {
    let attempt = queries::find_attempt(pool, attempt_id).await?.ok_or(AttemptError::NotFound)?;
    if attempt.student_id != student_id {
        return Err(AttemptError::NotOwner);
    }
    if attempt.completed {
        return Err(AttemptError::AlreadyCompleted);
    }

    let quiz = queries::find_by_id(pool, attempt.quiz_id).await?.ok_or(AttemptError::NotFound)?;
    if scoring::is_expired(attempt.started_at, quiz.time_limit, now) {
        return Ok(Saved::TimedOut(finish(pool, &attempt, &quiz, now).await?));
    }

    let option = option.trim().to_ascii_lowercase();
    if !is_valid_option(&option) {
        return Err(AttemptError::InvalidOption(option));
    }

    let question = queries::find_question(pool, question_id).await?.ok_or(AttemptError::NotFound)?;
    if question.quiz_id != attempt.quiz_id {
        return Err(AttemptError::QuestionNotInQuiz);
    }

    if !queries::upsert_response(pool, attempt.id, question.id, &option).await? {
        return Err(AttemptError::AlreadyCompleted);
    }
    Ok(Saved::Recorded)
}

/// Score and close the caller's attempt. A second submit is rejected.
pub async fn submit(
    pool: &PgPool,
    attempt_id: i64,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<Submitted, AttemptError> {
    let attempt = queries::find_attempt(pool, attempt_id).await?.ok_or(AttemptError::NotFound)?;
    if attempt.student_id != student_id {
        return Err(AttemptError::NotOwner);
    }
    if attempt.completed {
        return Err(AttemptError::AlreadyCompleted);
    }

    let quiz = queries::find_by_id(pool, attempt.quiz_id).await?.ok_or(AttemptError::NotFound)?;
    finish(pool, &attempt, &quiz, now).await
}

/// Grade the saved answers and flip the attempt to completed.
async fn finish(
    pool: &PgPool,
    attempt: &Attempt,
    quiz: &Quiz,
    now: DateTime<Utc>,
) -> Result<Submitted, AttemptError> {
    let outcome = grade(pool, attempt).await?;

    if !queries::complete_attempt(pool, attempt.id, outcome.score, now).await? {
        return Err(AttemptError::AlreadyCompleted);
    }

    Ok(Submitted {
        attempt_id: attempt.id,
        quiz_id: quiz.id,
        score: outcome.score,
        passed: scoring::passed(outcome.score, quiz.passing_score),
    })
}

pub async fn grade(pool: &PgPool, attempt: &Attempt) -> Result<QuizOutcome, sqlx::Error> {
    let questions = queries::questions(pool, attempt.quiz_id).await?;
    let answers = queries::answers(pool, attempt.id).await?;
    Ok(scoring::evaluate(&questions, &answers))
}

pub fn results_url(quiz_id: i64, attempt_id: i64) -> String {
    format!("/quizzes/{quiz_id}/results/{attempt_id}")
}
