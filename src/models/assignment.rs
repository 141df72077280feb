use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::policy::{ClassScoped, ListScope};

pub const DIFFICULTIES: &[&str] = &["easy", "medium", "hard"];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub class_level: String,
    pub created_by: i64,
    pub created_by_name: String,
    pub difficulty: String,
    pub due_date: DateTime<Utc>,
    pub total_points: i32,
    pub attachment_url: String,
    pub created_at: DateTime<Utc>,
}

impl ClassScoped for Assignment {
    fn class_level(&self) -> &str {
        &self.class_level
    }
    fn owner_id(&self) -> i64 {
        self.created_by
    }
}

impl Assignment {
    pub fn class_label(&self) -> String {
        crate::models::class_level::label(&self.class_level)
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        now > self.due_date
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Submission {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub submission_text: String,
    pub attachment_url: String,
    pub submitted_at: DateTime<Utc>,
    pub is_graded: bool,
    pub points_earned: Option<i32>,
    pub feedback: String,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<i64>,
    pub due_date: DateTime<Utc>,
    pub total_points: i32,
}

impl Submission {
    pub fn is_late(&self) -> bool {
        self.submitted_at > self.due_date
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignmentForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    pub subject_id: i64,
    pub class_level: String,
    pub difficulty: String,
    pub due_date: String,
    pub total_points: i32,
    #[serde(default)]
    pub attachment_url: String,
    pub csrf_token: String,
}

pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub subject_id: i64,
    pub class_level: String,
    pub created_by: i64,
    pub difficulty: String,
    pub due_date: DateTime<Utc>,
    pub total_points: i32,
    pub attachment_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionForm {
    #[serde(default)]
    pub submission_text: String,
    #[serde(default)]
    pub attachment_url: String,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GradeForm {
    pub points_earned: i32,
    #[serde(default)]
    pub feedback: String,
    pub csrf_token: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { id: i64, late: bool },
    AlreadySubmitted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum GradeError {
    PointsOutOfRange { max: i32 },
    NotFound,
}

/// Student's view row: assignment plus their own submission state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AssignmentListItem {
    pub id: i64,
    pub title: String,
    pub subject_name: String,
    pub class_level: String,
    pub created_by: i64,
    pub difficulty: String,
    pub due_date: DateTime<Utc>,
    pub total_points: i32,
    pub submission_count: i64,
    pub my_submission_id: Option<i64>,
    pub my_points: Option<i32>,
}

impl ClassScoped for AssignmentListItem {
    fn class_level(&self) -> &str {
        &self.class_level
    }
    fn owner_id(&self) -> i64 {
        self.created_by
    }
}

const SELECT_ASSIGNMENT: &str = "\
    SELECT a.id, a.title, a.description, a.instructions, a.subject_id, s.name AS subject_name, \
           a.class_level, a.created_by, COALESCE(NULLIF(u.display_name, ''), u.username) AS created_by_name, \
           a.difficulty, a.due_date, a.total_points, a.attachment_url, a.created_at \
    FROM assignments a \
    JOIN subjects s ON s.id = a.subject_id \
    JOIN users u ON u.id = a.created_by";

const SELECT_SUBMISSION: &str = "\
    SELECT sub.id, sub.assignment_id, sub.student_id, \
           COALESCE(NULLIF(u.display_name, ''), u.username) AS student_name, \
           sub.submission_text, sub.attachment_url, sub.submitted_at, sub.is_graded, sub.points_earned, \
           sub.feedback, sub.graded_at, sub.graded_by, a.due_date, a.total_points \
    FROM assignment_submissions sub \
    JOIN assignments a ON a.id = sub.assignment_id \
    JOIN users u ON u.id = sub.student_id";

/// Visible assignments; `$4` is the viewer, used to attach their own submission.
pub async fn find_visible(
    pool: &PgPool,
    scope: &ListScope,
    viewer_id: i64,
) -> Result<Vec<AssignmentListItem>, sqlx::Error> {
    sqlx::query_as::<_, AssignmentListItem>(&format!(
        "SELECT a.id, a.title, s.name AS subject_name, a.class_level, a.created_by, a.difficulty, \
                a.due_date, a.total_points, \
                (SELECT COUNT(*) FROM assignment_submissions x WHERE x.assignment_id = a.id) AS submission_count, \
                mine.id AS my_submission_id, mine.points_earned AS my_points \
         FROM assignments a \
         JOIN subjects s ON s.id = a.subject_id \
         LEFT JOIN assignment_submissions mine ON mine.assignment_id = a.id AND mine.student_id = $4 \
         WHERE {} ORDER BY a.due_date",
        ListScope::predicate("a", "created_by")
    ))
    .bind(scope.mode())
    .bind(scope.class_level())
    .bind(scope.user_id())
    .bind(viewer_id)
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!("{SELECT_ASSIGNMENT} WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn create(pool: &PgPool, new: &NewAssignment) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO assignments (title, description, instructions, subject_id, class_level, created_by, \
             difficulty, due_date, total_points, attachment_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.instructions)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(new.created_by)
    .bind(&new.difficulty)
    .bind(new.due_date)
    .bind(new.total_points)
    .bind(&new.attachment_url)
    .fetch_one(pool)
    .await
}

/// One submission per student; a second attempt is reported, not overwritten.
pub async fn submit(
    pool: &PgPool,
    assignment: &Assignment,
    student_id: i64,
    text: &str,
    attachment_url: &str,
    now: DateTime<Utc>,
) -> Result<SubmitOutcome, sqlx::Error> {
    let id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO assignment_submissions (assignment_id, student_id, submission_text, attachment_url, submitted_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (assignment_id, student_id) DO NOTHING RETURNING id",
    )
    .bind(assignment.id)
    .bind(student_id)
    .bind(text)
    .bind(attachment_url)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(match id {
        Some(id) => SubmitOutcome::Submitted { id, late: assignment.is_past_due(now) },
        None => SubmitOutcome::AlreadySubmitted,
    })
}

pub async fn find_submission(pool: &PgPool, id: i64) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!("{SELECT_SUBMISSION} WHERE sub.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_submission_for(
    pool: &PgPool,
    assignment_id: i64,
    student_id: i64,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "{SELECT_SUBMISSION} WHERE sub.assignment_id = $1 AND sub.student_id = $2"
    ))
    .bind(assignment_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub async fn submissions_for(pool: &PgPool, assignment_id: i64) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "{SELECT_SUBMISSION} WHERE sub.assignment_id = $1 ORDER BY sub.submitted_at"
    ))
    .bind(assignment_id)
    .fetch_all(pool)
    .await
}

pub fn check_points(points: i32, total_points: i32) -> Result<(), GradeError> {
    if (0..=total_points).contains(&points) {
        Ok(())
    } else {
        Err(GradeError::PointsOutOfRange { max: total_points })
    }
}

pub async fn grade(
    pool: &PgPool,
    submission: &Submission,
    points: i32,
    feedback: &str,
    graded_by: i64,
) -> Result<Result<(), GradeError>, sqlx::Error> {
    if let Err(e) = check_points(points, submission.total_points) {
        return Ok(Err(e));
    }

    let result = sqlx::query(
        "UPDATE assignment_submissions SET is_graded = TRUE, points_earned = $1, feedback = $2, \
             graded_by = $3, graded_at = NOW() \
         WHERE id = $4",
    )
    .bind(points)
    .bind(feedback)
    .bind(graded_by)
    .bind(submission.id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(Err(GradeError::NotFound));
    }
    Ok(Ok(()))
}

/// Assignments due in the next `days` days for a class level, not yet submitted by the student.
pub async fn upcoming_for_student(
    pool: &PgPool,
    class_level: &str,
    student_id: i64,
    days: i64,
) -> Result<Vec<Assignment>, sqlx::Error> {
    sqlx::query_as::<_, Assignment>(&format!(
        "{SELECT_ASSIGNMENT} WHERE a.class_level = $1 \
         AND a.due_date BETWEEN NOW() AND NOW() + make_interval(days => $3::int) \
         AND NOT EXISTS (SELECT 1 FROM assignment_submissions x \
                         WHERE x.assignment_id = a.id AND x.student_id = $2) \
         ORDER BY a.due_date"
    ))
    .bind(class_level)
    .bind(student_id)
    .bind(days as i32)
    .fetch_all(pool)
    .await
}

pub async fn count_ungraded_for_teacher(pool: &PgPool, teacher_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM assignment_submissions sub \
         JOIN assignments a ON a.id = sub.assignment_id \
         WHERE a.created_by = $1 AND sub.is_graded = FALSE",
    )
    .bind(teacher_id)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_must_fit_total() {
        assert_eq!(check_points(0, 100), Ok(()));
        assert_eq!(check_points(100, 100), Ok(()));
        assert_eq!(check_points(101, 100), Err(GradeError::PointsOutOfRange { max: 100 }));
        assert_eq!(check_points(-1, 50), Err(GradeError::PointsOutOfRange { max: 50 }));
    }
}
