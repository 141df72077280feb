use actix_session::Session;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use crate::auth::policy::{can_view, require_role};
use crate::auth::session::current_viewer;
use crate::errors::{AppError, render};
use crate::handlers::{flash_redirect, json_error};
use crate::models::quiz::attempt::{self, AttemptError, BeginOutcome, Saved};
use crate::models::quiz::{self, SaveResponseRequest, SubmitRequest, SubmitResponse, scoring};
use crate::models::user::{self, Role};
use crate::templates_structs::{PageContext, QuizResultsTemplate, QuizTakeTemplate, TakeQuestion};

use super::manage::visible_quiz;

/// Start or resume the student's attempt. An expired attempt is submitted
/// and the student lands on its results.
pub async fn take(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_role(&viewer, &[Role::Student])?;
    let found = visible_quiz(&pool, &viewer, path.into_inner()).await?;

    if found.question_count == 0 {
        return Ok(flash_redirect(&session, "This quiz has no questions yet", &format!("/quizzes/{}", found.id)));
    }

    let now = Utc::now();
    let open = match attempt::begin_or_resume(&pool, &found, viewer.user_id, now).await {
        Ok(BeginOutcome::Started(a)) => {
            log::info!("User {} started quiz {} (attempt {})", viewer.user_id, found.id, a.id);
            a
        }
        Ok(BeginOutcome::Resumed(a)) => a,
        Ok(BeginOutcome::TimedOut { attempt_id, score }) => {
            return Ok(flash_redirect(
                &session,
                format!("Time ran out. Your saved answers were submitted with a score of {score}%."),
                &attempt::results_url(found.id, attempt_id),
            ));
        }
        Err(AttemptError::Db(e)) => return Err(e.into()),
        Err(e) => return Err(AppError::Validation(e.to_string())),
    };

    let answers = quiz::answers(&pool, open.id).await?;
    let questions = quiz::questions(&pool, found.id)
        .await?
        .into_iter()
        .map(|q| {
            let selected = answers.get(&q.id).cloned().unwrap_or_default();
            TakeQuestion { question: q, selected }
        })
        .collect();

    let ctx = PageContext::build(&session, &pool, &viewer, "/quizzes").await?;
    render(QuizTakeTemplate {
        ctx,
        seconds_remaining: scoring::seconds_remaining(open.started_at, found.time_limit, now),
        quiz: found,
        attempt_id: open.id,
        questions,
    })
}

/// Results for a completed attempt: the student's own, or any for staff who
/// can see the quiz.
pub async fn results(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let (quiz_id, attempt_id) = path.into_inner();

    let found = quiz::find_by_id(&pool, quiz_id).await?.ok_or(AppError::NotFound)?;
    let done = quiz::find_attempt(&pool, attempt_id).await?.ok_or(AppError::NotFound)?;
    if done.quiz_id != found.id {
        return Err(AppError::NotFound);
    }

    let is_owner = done.student_id == viewer.user_id;
    if !is_owner && !(viewer.is_staff() && can_view(&viewer, &found)) {
        return Err(AppError::PermissionDenied(format!(
            "user {} may not see attempt {attempt_id}",
            viewer.user_id
        )));
    }
    if !done.completed {
        return Ok(flash_redirect(&session, "Finish the quiz to see your results", &format!("/quizzes/{quiz_id}/take")));
    }

    let answers = quiz::answers(&pool, done.id).await?;
    let questions = quiz::questions(&pool, found.id).await?;
    let outcome = scoring::evaluate(&questions, &answers);
    let review = scoring::review(questions, &answers);
    let score = done.score.unwrap_or(outcome.score);
    let minutes_taken = done
        .completed_at
        .map(|end| (end - done.started_at).num_minutes())
        .unwrap_or(0);
    let student_name = match user::find_by_id(&pool, done.student_id).await? {
        Some(u) => u.name().to_string(),
        None => "Unknown student".to_string(),
    };

    let ctx = PageContext::build(&session, &pool, &viewer, "/quizzes").await?;
    render(QuizResultsTemplate {
        ctx,
        passed: scoring::passed(score, found.passing_score),
        quiz: found,
        attempt: done,
        outcome,
        minutes_taken,
        review,
        student_name,
    })
}

fn attempt_error_response(e: AttemptError) -> HttpResponse {
    let status = match &e {
        AttemptError::NotFound => StatusCode::NOT_FOUND,
        AttemptError::NotOwner => StatusCode::FORBIDDEN,
        AttemptError::AlreadyCompleted => StatusCode::CONFLICT,
        AttemptError::QuestionNotInQuiz | AttemptError::InvalidOption(_) => StatusCode::BAD_REQUEST,
        AttemptError::Db(db) => {
            log::error!("Quiz attempt database error: {db}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };
    json_error(status, e)
}

/// `POST /api/quiz/responses`
pub async fn save_response(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<SaveResponseRequest>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    if !viewer.is_student() {
        return Ok(json_error(StatusCode::FORBIDDEN, "Only students take quizzes"));
    }

    let saved = attempt::save_response(
        &pool,
        body.attempt_id,
        viewer.user_id,
        body.question_id,
        &body.selected_option,
        Utc::now(),
    )
    .await;
    Ok(match saved {
        Ok(Saved::Recorded) => HttpResponse::Ok().json(json!({ "ok": true })),
        Ok(Saved::TimedOut(done)) => {
            log::info!(
                "User {} answered after the limit; quiz {} attempt {} closed with score {}",
                viewer.user_id, done.quiz_id, done.attempt_id, done.score
            );
            HttpResponse::Conflict().json(json!({
                "ok": false,
                "error": "Time is up",
                "redirect_url": attempt::results_url(done.quiz_id, done.attempt_id),
            }))
        }
        Err(e) => attempt_error_response(e),
    })
}

/// `POST /api/quiz/submit`. A second submit of the same attempt is rejected.
pub async fn submit(
    pool: web::Data<PgPool>,
    session: Session,
    body: web::Json<SubmitRequest>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    if !viewer.is_student() {
        return Ok(json_error(StatusCode::FORBIDDEN, "Only students take quizzes"));
    }

    match attempt::submit(&pool, body.attempt_id, viewer.user_id, Utc::now()).await {
        Ok(done) => {
            log::info!(
                "User {} submitted quiz {} attempt {} with score {}",
                viewer.user_id, done.quiz_id, done.attempt_id, done.score
            );
            Ok(HttpResponse::Ok().json(SubmitResponse {
                ok: true,
                score: done.score,
                passed: done.passed,
                redirect_url: attempt::results_url(done.quiz_id, done.attempt_id),
            }))
        }
        Err(e) => Ok(attempt_error_response(e)),
    }
}
