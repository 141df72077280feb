//! Quiz attempt tests. Covers the attempt lifecycle against a real database.
//!
//! - Answers are saved, scored with integer percentages and checked against the pass mark
//! - A completed attempt rejects further answers and a second submit
//! - Attempts belong to one student
//! - An open attempt past its time limit is submitted on the next visit or the next answer

mod common;

use chrono::Utc;

use classlearn::models::quiz::attempt::{self, AttemptError, BeginOutcome, Saved};
use classlearn::models::quiz::{self, NewQuestion, NewQuiz};
use classlearn::models::user::Role;
use common::*;

struct Fixture {
    quiz_id: i64,
    question_ids: Vec<i64>,
    student_id: i64,
}

async fn quiz_with_questions(pool: &sqlx::PgPool, time_limit: i32) -> Fixture {
    let subject_id = create_subject(pool, "Mathematics").await;
    let teacher_id = create_user(pool, "teacher", Role::Teacher, None).await;
    let student_id = create_user(pool, "student", Role::Student, Some(CLASS_FIVE)).await;

    let quiz_id = quiz::create(
        pool,
        &NewQuiz {
            title: "Fractions".to_string(),
            description: String::new(),
            subject_id,
            class_level: CLASS_FIVE.to_string(),
            created_by: teacher_id,
            time_limit,
            passing_score: 70,
        },
    )
    .await
    .expect("Failed to create quiz");

    let questions: Vec<NewQuestion> = ["a", "b", "c"]
        .iter()
        .enumerate()
        .map(|(i, correct)| NewQuestion {
            question_text: format!("Question {}", i + 1),
            option_a: "one".to_string(),
            option_b: "two".to_string(),
            option_c: "three".to_string(),
            option_d: "four".to_string(),
            correct_option: correct.to_string(),
            explanation: String::new(),
        })
        .collect();
    let question_ids = quiz::add_questions(pool, quiz_id, &questions)
        .await
        .expect("Failed to add questions");

    Fixture { quiz_id, question_ids, student_id }
}

async fn start(pool: &sqlx::PgPool, f: &Fixture) -> i64 {
    let quiz = quiz::find_by_id(pool, f.quiz_id).await.expect("Query failed").expect("Quiz not found");
    match attempt::begin_or_resume(pool, &quiz, f.student_id, Utc::now()).await {
        Ok(BeginOutcome::Started(a)) => a.id,
        other => panic!("Expected a new attempt, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_scores_with_floor_percentage() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 0).await;
    let attempt_id = start(pool, &f).await;

    // Two of three right, one unanswered.
    attempt::save_response(pool, attempt_id, f.student_id, f.question_ids[0], "a", Utc::now()).await.expect("Save failed");
    attempt::save_response(pool, attempt_id, f.student_id, f.question_ids[1], "B", Utc::now()).await.expect("Save failed");

    let done = attempt::submit(pool, attempt_id, f.student_id, Utc::now()).await.expect("Submit failed");
    assert_eq!(done.score, 66);
    assert!(!done.passed);
    assert_eq!(done.quiz_id, f.quiz_id);

    db.teardown().await;
}

#[tokio::test]
async fn test_changing_an_answer_keeps_the_latest() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 0).await;
    let attempt_id = start(pool, &f).await;

    for (qid, option) in f.question_ids.iter().zip(["a", "b", "d"]) {
        attempt::save_response(pool, attempt_id, f.student_id, *qid, option, Utc::now()).await.expect("Save failed");
    }
    attempt::save_response(pool, attempt_id, f.student_id, f.question_ids[2], "c", Utc::now()).await.expect("Save failed");

    let done = attempt::submit(pool, attempt_id, f.student_id, Utc::now()).await.expect("Submit failed");
    assert_eq!(done.score, 100);
    assert!(done.passed);

    db.teardown().await;
}

#[tokio::test]
async fn test_second_submit_is_rejected() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 0).await;
    let attempt_id = start(pool, &f).await;

    attempt::submit(pool, attempt_id, f.student_id, Utc::now()).await.expect("Submit failed");

    let again = attempt::submit(pool, attempt_id, f.student_id, Utc::now()).await;
    assert!(matches!(again, Err(AttemptError::AlreadyCompleted)));

    let late_answer = attempt::save_response(pool, attempt_id, f.student_id, f.question_ids[0], "a", Utc::now()).await;
    assert!(matches!(late_answer, Err(AttemptError::AlreadyCompleted)));

    db.teardown().await;
}

#[tokio::test]
async fn test_attempt_belongs_to_its_student() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 0).await;
    let attempt_id = start(pool, &f).await;
    let other = create_user(pool, "other", Role::Student, Some(CLASS_FIVE)).await;

    let saved = attempt::save_response(pool, attempt_id, other, f.question_ids[0], "a", Utc::now()).await;
    assert!(matches!(saved, Err(AttemptError::NotOwner)));

    let submitted = attempt::submit(pool, attempt_id, other, Utc::now()).await;
    assert!(matches!(submitted, Err(AttemptError::NotOwner)));

    db.teardown().await;
}

#[tokio::test]
async fn test_invalid_option_is_rejected() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 0).await;
    let attempt_id = start(pool, &f).await;

    let saved = attempt::save_response(pool, attempt_id, f.student_id, f.question_ids[0], "e", Utc::now()).await;
    assert!(matches!(saved, Err(AttemptError::InvalidOption(_))));

    db.teardown().await;
}

#[tokio::test]
async fn test_revisit_resumes_open_attempt() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 30).await;
    let attempt_id = start(pool, &f).await;

    let quiz = quiz::find_by_id(pool, f.quiz_id).await.expect("Query failed").expect("Quiz not found");
    match attempt::begin_or_resume(pool, &quiz, f.student_id, Utc::now()).await {
        Ok(BeginOutcome::Resumed(a)) => assert_eq!(a.id, attempt_id),
        other => panic!("Expected the open attempt, got {other:?}"),
    }

    db.teardown().await;
}

#[tokio::test]
async fn test_expired_attempt_is_submitted_on_revisit() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 10).await;

    let open = quiz::insert_open_attempt(pool, f.quiz_id, f.student_id, minutes_ago(20))
        .await
        .expect("Insert failed")
        .expect("Attempt already open");
    attempt::save_response(pool, open.id, f.student_id, f.question_ids[0], "a", minutes_ago(15)).await.expect("Save failed");

    let quiz = quiz::find_by_id(pool, f.quiz_id).await.expect("Query failed").expect("Quiz not found");
    match attempt::begin_or_resume(pool, &quiz, f.student_id, Utc::now()).await {
        Ok(BeginOutcome::TimedOut { attempt_id, score }) => {
            assert_eq!(attempt_id, open.id);
            assert_eq!(score, 33);
        }
        other => panic!("Expected a timed-out attempt, got {other:?}"),
    }

    let stored = quiz::find_attempt(pool, open.id).await.expect("Query failed").expect("Attempt missing");
    assert!(stored.completed);

    db.teardown().await;
}

#[tokio::test]
async fn test_late_answer_closes_expired_attempt() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let f = quiz_with_questions(pool, 10).await;

    let open = quiz::insert_open_attempt(pool, f.quiz_id, f.student_id, minutes_ago(20))
        .await
        .expect("Insert failed")
        .expect("Attempt already open");
    let early = attempt::save_response(pool, open.id, f.student_id, f.question_ids[0], "a", minutes_ago(15)).await;
    assert!(matches!(early, Ok(Saved::Recorded)));

    let late = attempt::save_response(pool, open.id, f.student_id, f.question_ids[1], "b", Utc::now()).await;
    match late {
        Ok(Saved::TimedOut(done)) => {
            assert_eq!(done.attempt_id, open.id);
            assert_eq!(done.score, 33);
        }
        other => panic!("Expected the attempt to close, got {other:?}"),
    }

    let answers = quiz::answers(pool, open.id).await.expect("Query failed");
    assert_eq!(answers.len(), 1);
    let stored = quiz::find_attempt(pool, open.id).await.expect("Query failed").expect("Attempt missing");
    assert!(stored.completed);

    db.teardown().await;
}
