//! Weekly learning summary and improvement areas for students.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct WeeklyStats {
    pub assignments_submitted: i64,
    pub classes_attended: i64,
    pub tutor_sessions: i64,
    pub tutor_questions: i64,
    pub quizzes_completed: i64,
    pub average_quiz_score: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubjectActivity {
    pub name: String,
    pub sessions: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Deadline {
    pub assignment_id: i64,
    pub title: String,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImprovementArea {
    pub description: String,
    pub suggestion: String,
}

#[derive(Debug, Clone)]
pub struct WeeklySummary {
    pub since: DateTime<Utc>,
    pub stats: WeeklyStats,
    pub top_subjects: Vec<SubjectActivity>,
    pub achievements: Vec<String>,
    pub improvement_areas: Vec<ImprovementArea>,
    pub upcoming_deadlines: Vec<Deadline>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct GoodGrade {
    title: String,
    points_earned: i32,
    total_points: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct WeakSubject {
    name: String,
    average_score: f64,
}

pub async fn weekly_summary(
    pool: &PgPool,
    student_id: i64,
    class_level: Option<&str>,
    now: DateTime<Utc>,
) -> Result<WeeklySummary, sqlx::Error> {
    let since = now - chrono::Duration::days(7);

    let stats = sqlx::query_as::<_, WeeklyStats>(
        "SELECT \
            (SELECT COUNT(*) FROM assignment_submissions WHERE student_id = $1 AND submitted_at >= $2) \
                AS assignments_submitted, \
            (SELECT COUNT(*) FROM conference_participants WHERE user_id = $1 AND attended AND joined_at >= $2) \
                AS classes_attended, \
            (SELECT COUNT(*) FROM tutor_sessions WHERE student_id = $1 AND started_at >= $2) \
                AS tutor_sessions, \
            (SELECT COUNT(*) FROM tutor_messages m JOIN tutor_sessions t ON t.id = m.session_id \
                WHERE t.student_id = $1 AND m.message_type IN ('question', 'thread_question') \
                AND m.created_at >= $2) AS tutor_questions, \
            (SELECT COUNT(*) FROM quiz_attempts WHERE student_id = $1 AND completed AND completed_at >= $2) \
                AS quizzes_completed, \
            (SELECT AVG(score)::float8 FROM quiz_attempts WHERE student_id = $1 AND completed AND completed_at >= $2) \
                AS average_quiz_score",
    )
    .bind(student_id)
    .bind(since)
    .fetch_one(pool)
    .await?;

    let top_subjects = sqlx::query_as::<_, SubjectActivity>(
        "SELECT s.name, COUNT(*) AS sessions FROM tutor_sessions t JOIN subjects s ON s.id = t.subject_id \
         WHERE t.student_id = $1 AND t.started_at >= $2 \
         GROUP BY s.name ORDER BY sessions DESC, s.name LIMIT 3",
    )
    .bind(student_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let good_grades = sqlx::query_as::<_, GoodGrade>(
        "SELECT a.title, sub.points_earned, a.total_points FROM assignment_submissions sub \
         JOIN assignments a ON a.id = sub.assignment_id \
         WHERE sub.student_id = $1 AND sub.submitted_at >= $2 AND sub.is_graded \
         AND sub.points_earned * 5 >= a.total_points * 4 \
         ORDER BY sub.graded_at DESC",
    )
    .bind(student_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let upcoming_deadlines = match class_level {
        Some(level) => upcoming_deadlines(pool, level, now).await?,
        None => Vec::new(),
    };

    let mut achievements: Vec<String> = good_grades
        .iter()
        .map(|g| format!("Scored {}/{} on '{}'", g.points_earned, g.total_points, g.title))
        .collect();
    if stats.tutor_sessions >= 5 {
        achievements.push(format!("Completed {} AI tutoring sessions this week", stats.tutor_sessions));
    }
    if stats.quizzes_completed >= 3 {
        achievements.push(format!("Finished {} quizzes this week", stats.quizzes_completed));
    }
    achievements.truncate(3);

    let improvement_areas = improvement_areas(pool, student_id, class_level, now).await?;

    Ok(WeeklySummary {
        since,
        stats,
        top_subjects,
        achievements,
        improvement_areas,
        upcoming_deadlines,
    })
}

pub async fn upcoming_deadlines(
    pool: &PgPool,
    class_level: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Deadline>, sqlx::Error> {
    sqlx::query_as::<_, Deadline>(
        "SELECT id AS assignment_id, title, due_date FROM assignments \
         WHERE class_level = $1 AND due_date > $2 AND due_date < $2 + INTERVAL '7 days' \
         ORDER BY due_date LIMIT 5",
    )
    .bind(class_level)
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Missing past-due work, subjects gone quiet in the tutor, and subjects
/// where the average quiz score is below the pass mark.
pub async fn improvement_areas(
    pool: &PgPool,
    student_id: i64,
    class_level: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<ImprovementArea>, sqlx::Error> {
    let mut areas = Vec::new();

    if let Some(level) = class_level {
        let missing: Vec<String> = sqlx::query_scalar(
            "SELECT a.title FROM assignments a \
             WHERE a.class_level = $1 AND a.due_date < $3 \
             AND NOT EXISTS (SELECT 1 FROM assignment_submissions x \
                             WHERE x.assignment_id = a.id AND x.student_id = $2) \
             ORDER BY a.due_date DESC LIMIT 2",
        )
        .bind(level)
        .bind(student_id)
        .bind(now)
        .fetch_all(pool)
        .await?;

        areas.extend(missing.into_iter().map(|title| ImprovementArea {
            description: format!("Missing submission for '{title}'"),
            suggestion: "Try to complete assignments before their due dates".to_string(),
        }));
    }

    let quiet: Vec<String> = sqlx::query_scalar(
        "SELECT s.name FROM tutor_sessions t JOIN subjects s ON s.id = t.subject_id \
         WHERE t.student_id = $1 GROUP BY s.name \
         HAVING MAX(t.started_at) < $2 - INTERVAL '14 days' \
         ORDER BY s.name LIMIT 2",
    )
    .bind(student_id)
    .bind(now)
    .fetch_all(pool)
    .await?;

    areas.extend(quiet.into_iter().map(|name| ImprovementArea {
        suggestion: format!("Consider scheduling more study time for {name}"),
        description: format!("Low recent activity in {name}"),
    }));

    let weak = sqlx::query_as::<_, WeakSubject>(
        "SELECT s.name, AVG(a.score)::float8 AS average_score FROM quiz_attempts a \
         JOIN quizzes q ON q.id = a.quiz_id JOIN subjects s ON s.id = q.subject_id \
         WHERE a.student_id = $1 AND a.completed \
         GROUP BY s.name HAVING AVG(a.score) < AVG(q.passing_score) \
         ORDER BY average_score LIMIT 3",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    areas.extend(weak.into_iter().map(|w| ImprovementArea {
        description: format!("Average quiz score of {:.0}% in {}", w.average_score, w.name),
        suggestion: format!("Review {} study materials and ask the AI tutor for practice questions", w.name),
    }));

    Ok(areas)
}
