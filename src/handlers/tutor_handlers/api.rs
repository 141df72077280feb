use actix_session::Session;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::auth::policy::Viewer;
use crate::auth::session::current_viewer;
use crate::errors::AppError;
use crate::handlers::json_error;
use crate::models::settings;
use crate::models::tutor::{
    self, AskRequest, EditMessageRequest, MessageType, PracticeRequest, RenameRequest, ThreadReplyRequest,
    TutorMessage, TutorSession,
};
use crate::services::Services;
use crate::services::tutor_ai::PromptContext;

use super::pages::{curriculum, owned_session};

const MAX_QUESTION_LEN: usize = 2000;
const CONTEXT_MESSAGES: i64 = 10;

/// Ownership check for the JSON endpoints: a missing or foreign session is a
/// JSON error, not an HTML page.
async fn session_or_error(pool: &PgPool, viewer: &Viewer, id: i64) -> Result<Result<TutorSession, HttpResponse>, AppError> {
    match owned_session(pool, viewer, id).await {
        Ok(s) => Ok(Ok(s)),
        Err(AppError::NotFound) => Ok(Err(json_error(StatusCode::NOT_FOUND, "Session not found"))),
        Err(AppError::PermissionDenied(_)) => Ok(Err(json_error(StatusCode::FORBIDDEN, "Access denied"))),
        Err(e) => Err(e),
    }
}

fn check_question(text: &str) -> Option<HttpResponse> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Some(json_error(StatusCode::BAD_REQUEST, "Question cannot be empty"))
    } else if trimmed.chars().count() > MAX_QUESTION_LEN {
        Some(json_error(StatusCode::BAD_REQUEST, format!("Question is limited to {MAX_QUESTION_LEN} characters")))
    } else {
        None
    }
}

/// Prompt context plus the user's answer preferences.
async fn prompt_for(
    pool: &PgPool,
    viewer: &Viewer,
    subject: Option<String>,
) -> Result<(PromptContext, String), AppError> {
    let names = curriculum(pool, viewer).await?.into_iter().map(|s| s.name).collect();
    let prefs = settings::get_or_create(pool, viewer.user_id).await?;
    let ctx = PromptContext {
        role: viewer.role,
        class_level: viewer.class_level.clone(),
        subject,
        curriculum: names,
    };
    let style = format!(
        "Preferred learning style: {}. Preferred answer length: {}.",
        prefs.preferred_learning_style, prefs.ai_response_length
    );
    Ok((ctx, style))
}

fn message_json(m: &TutorMessage) -> serde_json::Value {
    json!({
        "id": m.id,
        "type": m.message_type,
        "content": m.content,
        "parent_id": m.parent_id,
        "created_at": m.created_at.to_rfc3339(),
    })
}

/// `POST /api/tutor/ask`. Continues the given or active session, or opens one.
pub async fn ask(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    body: web::Json<AskRequest>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    if let Some(resp) = check_question(&body.question) {
        return Ok(resp);
    }
    let question = body.question.trim();

    // The subject has to be part of the asker's curriculum.
    let offered = curriculum(&pool, &viewer).await?;
    let subject = match body.subject_id {
        Some(id) => match offered.iter().find(|s| s.id == id) {
            Some(s) => Some(s.clone()),
            None => return Ok(json_error(StatusCode::BAD_REQUEST, "That subject is not part of your class")),
        },
        None => None,
    };

    let current = match body.session_id {
        Some(id) => match session_or_error(&pool, &viewer, id).await? {
            Ok(s) if s.is_active => Some(s),
            Ok(_) => return Ok(json_error(StatusCode::CONFLICT, "That session has ended")),
            Err(resp) => return Ok(resp),
        },
        None => tutor::active_session(&pool, viewer.user_id).await?,
    };

    let (session_id, session_subject) = match current {
        Some(s) => (s.id, s.subject_name),
        None => {
            let title = tutor::title_from_question(question);
            let id = tutor::create_session(&pool, viewer.user_id, subject.as_ref().map(|s| s.id), &title).await?;
            log::info!("User {} opened tutor session {id}", viewer.user_id);
            (id, None)
        }
    };

    let subject_name = subject.map(|s| s.name).or(session_subject);
    let history = tutor::recent_context(&pool, session_id, CONTEXT_MESSAGES).await?;
    let question_id = tutor::add_message(&pool, session_id, MessageType::Question, question, None).await?;

    let (ctx, style) = prompt_for(&pool, &viewer, subject_name).await?;
    let answer = services.tutor.answer(&ctx, &history, Some(&style), question).await;
    let answer_id = tutor::add_message(&pool, session_id, MessageType::Answer, &answer, None).await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "session_id": session_id,
        "question_id": question_id,
        "answer_id": answer_id,
        "answer": answer,
    })))
}

/// `POST /api/tutor/thread-reply`. A follow-up attached to an earlier message.
pub async fn thread_reply(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    body: web::Json<ThreadReplyRequest>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    if let Some(resp) = check_question(&body.question) {
        return Ok(resp);
    }
    let question = body.question.trim();

    let Some(parent) = tutor::find_message(&pool, body.parent_id).await? else {
        return Ok(json_error(StatusCode::NOT_FOUND, "Message not found"));
    };
    let owner = match session_or_error(&pool, &viewer, parent.session_id).await? {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };

    let history = tutor::recent_context(&pool, owner.id, CONTEXT_MESSAGES).await?;
    let reply_id = tutor::add_message(&pool, owner.id, MessageType::ThreadQuestion, question, Some(parent.id)).await?;

    let (ctx, style) = prompt_for(&pool, &viewer, owner.subject_name.clone()).await?;
    let extra = format!("{style} The student is following up on this earlier message: {}", parent.content);
    let answer = services.tutor.answer(&ctx, &history, Some(&extra), question).await;
    let answer_id = tutor::add_message(&pool, owner.id, MessageType::ThreadAnswer, &answer, Some(parent.id)).await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "parent_id": parent.id,
        "question_id": reply_id,
        "answer_id": answer_id,
        "answer": answer,
    })))
}

/// `POST /api/tutor/edit-message`. Rewrites a question, drops everything after
/// it and answers again.
pub async fn edit_message(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    body: web::Json<EditMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    if let Some(resp) = check_question(&body.content) {
        return Ok(resp);
    }
    let content = body.content.trim();

    let Some(message) = tutor::find_message(&pool, body.message_id).await? else {
        return Ok(json_error(StatusCode::NOT_FOUND, "Message not found"));
    };
    let owner = match session_or_error(&pool, &viewer, message.session_id).await? {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };
    if message.kind() != Some(MessageType::Question) {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Only your own questions can be edited"));
    }

    let removed = tutor::edit_and_truncate(&pool, &message, content).await?;
    log::info!("Tutor message {} edited; {removed} later message(s) removed", message.id);

    let history: Vec<TutorMessage> = tutor::recent_context(&pool, owner.id, CONTEXT_MESSAGES + 1)
        .await?
        .into_iter()
        .filter(|m| m.id != message.id)
        .collect();
    let (ctx, style) = prompt_for(&pool, &viewer, owner.subject_name.clone()).await?;
    let answer = services.tutor.answer(&ctx, &history, Some(&style), content).await;
    let answer_id = tutor::add_message(&pool, owner.id, MessageType::Answer, &answer, None).await?;

    let transcript: Vec<_> = tutor::messages(&pool, owner.id).await?.iter().map(message_json).collect();
    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "answer_id": answer_id,
        "answer": answer,
        "removed": removed,
        "messages": transcript,
    })))
}

/// `POST /api/tutor/practice-questions`
pub async fn practice_questions(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    body: web::Json<PracticeRequest>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let topic = body.topic.trim();
    if topic.is_empty() {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Topic is required"));
    }
    if let Some(id) = body.subject_id {
        if !curriculum(&pool, &viewer).await?.iter().any(|s| s.id == id) {
            return Ok(json_error(StatusCode::BAD_REQUEST, "That subject is not part of your class"));
        }
    }

    let questions = match services.tutor.practice_questions(topic, body.count, "medium").await {
        Ok(q) => q,
        Err(e) => {
            log::warn!("Practice questions for user {} failed: {e}", viewer.user_id);
            return Ok(json_error(StatusCode::SERVICE_UNAVAILABLE, e));
        }
    };

    // Keep a copy in the open session so it shows up in the transcript.
    if let Some(active) = tutor::active_session(&pool, viewer.user_id).await? {
        let text = questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("{}. {}\n   Answer: {}", i + 1, q.question, q.answer))
            .collect::<Vec<_>>()
            .join("\n");
        tutor::add_message(&pool, active.id, MessageType::QuestionGen, &format!("Practice: {topic}\n{text}"), None).await?;
    }

    Ok(HttpResponse::Ok().json(json!({ "ok": true, "topic": topic, "questions": questions })))
}

/// `POST /api/tutor/sessions/{id}/rename`
pub async fn rename(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    body: web::Json<RenameRequest>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let owner = match session_or_error(&pool, &viewer, path.into_inner()).await? {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };
    let title = body.title.trim();
    if title.is_empty() || title.chars().count() > 200 {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Title must be 1 to 200 characters"));
    }
    tutor::rename(&pool, owner.id, title).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "title": title })))
}

/// `POST /api/tutor/sessions/{id}/pin`
pub async fn toggle_pin(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let owner = match session_or_error(&pool, &viewer, path.into_inner()).await? {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };
    let pinned = tutor::toggle_pin(&pool, owner.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "is_pinned": pinned })))
}

/// `POST /api/tutor/sessions/{id}/delete`
pub async fn delete_session(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let owner = match session_or_error(&pool, &viewer, path.into_inner()).await? {
        Ok(s) => s,
        Err(resp) => return Ok(resp),
    };
    tutor::delete_session(&pool, owner.id).await?;
    log::info!("User {} deleted tutor session {}", viewer.user_id, owner.id);
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

/// `POST /api/tutor/end-session`. Closes the active session, if any.
pub async fn end_session(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let ended = match tutor::active_session(&pool, viewer.user_id).await? {
        Some(active) => {
            tutor::end_session(&pool, active.id).await?;
            Some(active.id)
        }
        None => None,
    };
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "ended_session_id": ended })))
}
