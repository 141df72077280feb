//! Assignment tests: one submission per student, late flagging and grading bounds.

mod common;

use chrono::{Duration, Utc};

use classlearn::models::assignment::{self, GradeError, NewAssignment, SubmitOutcome};
use classlearn::models::user::Role;
use common::*;

async fn assignment_due_in(pool: &sqlx::PgPool, hours: i64) -> (assignment::Assignment, i64) {
    let subject_id = create_subject(pool, "English").await;
    let teacher = create_user(pool, "teacher", Role::Teacher, Some(CLASS_FIVE)).await;
    let id = assignment::create(
        pool,
        &NewAssignment {
            title: "Essay".to_string(),
            description: String::new(),
            instructions: "Write 300 words".to_string(),
            subject_id,
            class_level: CLASS_FIVE.to_string(),
            created_by: teacher,
            difficulty: "medium".to_string(),
            due_date: Utc::now() + Duration::hours(hours),
            total_points: 20,
            attachment_url: String::new(),
        },
    )
    .await
    .expect("Failed to create assignment");
    let found = assignment::find_by_id(pool, id).await.expect("Query failed").expect("Assignment missing");
    (found, teacher)
}

#[tokio::test]
async fn test_single_submission_per_student() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let (a, _) = assignment_due_in(pool, 24).await;
    let student = create_user(pool, "student", Role::Student, Some(CLASS_FIVE)).await;

    let first = assignment::submit(pool, &a, student, "My essay", "", Utc::now()).await.expect("Submit failed");
    assert!(matches!(first, SubmitOutcome::Submitted { late: false, .. }));

    let second = assignment::submit(pool, &a, student, "Rewritten", "", Utc::now()).await.expect("Submit failed");
    assert_eq!(second, SubmitOutcome::AlreadySubmitted);

    let stored = assignment::find_submission_for(pool, a.id, student)
        .await
        .expect("Query failed")
        .expect("Submission missing");
    assert_eq!(stored.submission_text, "My essay");

    db.teardown().await;
}

#[tokio::test]
async fn test_late_submission_is_flagged() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let (a, _) = assignment_due_in(pool, -2).await;
    let student = create_user(pool, "student", Role::Student, Some(CLASS_FIVE)).await;

    let outcome = assignment::submit(pool, &a, student, "Sorry", "", Utc::now()).await.expect("Submit failed");
    let SubmitOutcome::Submitted { id, late } = outcome else {
        panic!("Expected a submission");
    };
    assert!(late);

    let stored = assignment::find_submission(pool, id).await.expect("Query failed").expect("Submission missing");
    assert!(stored.is_late());

    db.teardown().await;
}

#[tokio::test]
async fn test_grading_bounds() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let (a, teacher) = assignment_due_in(pool, 24).await;
    let student = create_user(pool, "student", Role::Student, Some(CLASS_FIVE)).await;
    let SubmitOutcome::Submitted { id, .. } =
        assignment::submit(pool, &a, student, "Done", "", Utc::now()).await.expect("Submit failed")
    else {
        panic!("Expected a submission");
    };
    let submission = assignment::find_submission(pool, id).await.expect("Query failed").expect("Submission missing");

    let too_high = assignment::grade(pool, &submission, 21, "", teacher).await.expect("Grade failed");
    assert_eq!(too_high, Err(GradeError::PointsOutOfRange { max: 20 }));
    let negative = assignment::grade(pool, &submission, -1, "", teacher).await.expect("Grade failed");
    assert_eq!(negative, Err(GradeError::PointsOutOfRange { max: 20 }));

    let ok = assignment::grade(pool, &submission, 18, "Well argued", teacher).await.expect("Grade failed");
    assert_eq!(ok, Ok(()));

    let graded = assignment::find_submission(pool, id).await.expect("Query failed").expect("Submission missing");
    assert!(graded.is_graded);
    assert_eq!(graded.points_earned, Some(18));
    assert_eq!(graded.feedback, "Well argued");
    assert_eq!(graded.graded_by, Some(teacher));

    let pending = assignment::count_ungraded_for_teacher(pool, teacher).await.expect("Count failed");
    assert_eq!(pending, 0);

    db.teardown().await;
}
