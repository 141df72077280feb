use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::policy::Viewer;
use crate::auth::session::current_viewer;
use crate::errors::{AppError, render};
use crate::handlers::{CsrfOnly, flash_redirect};
use crate::models::tutor::{self, TutorSession};
use crate::models::{subject, user};
use crate::services::Services;
use crate::services::notify::messages;
use crate::templates_structs::{
    PageContext, TutorHistoryTemplate, TutorSessionTemplate, TutorTemplate, subject_options,
};

/// Tutor sessions are private to the user who opened them.
pub(super) async fn owned_session(pool: &PgPool, viewer: &Viewer, id: i64) -> Result<TutorSession, AppError> {
    let found = tutor::find_session(pool, id).await?.ok_or(AppError::NotFound)?;
    if found.student_id != viewer.user_id {
        return Err(AppError::PermissionDenied(format!(
            "tutor session {id} belongs to another user"
        )));
    }
    Ok(found)
}

/// Subjects offered in the chat: the class curriculum, or every subject for
/// users without a class.
pub(super) async fn curriculum(pool: &PgPool, viewer: &Viewer) -> Result<Vec<subject::Subject>, sqlx::Error> {
    match &viewer.class_level {
        Some(level) => subject::find_for_class(pool, level).await,
        None => subject::find_all(pool).await,
    }
}

pub async fn chat(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let active = tutor::active_session(&pool, viewer.user_id).await?;
    let messages = match &active {
        Some(s) => tutor::messages(&pool, s.id).await?,
        None => vec![],
    };
    let subjects = curriculum(&pool, &viewer).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/tutor").await?;

    render(TutorTemplate {
        ctx,
        session: active,
        messages,
        subjects: subject_options(&subjects),
        ai_enabled: services.tutor.is_configured(),
    })
}

pub async fn history(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let sessions = tutor::history(&pool, viewer.user_id).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/tutor").await?;
    render(TutorHistoryTemplate { ctx, sessions })
}

pub async fn session_detail(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = owned_session(&pool, &viewer, path.into_inner()).await?;
    let messages = tutor::messages(&pool, found.id).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/tutor").await?;
    render(TutorSessionTemplate { ctx, session: found, messages })
}

/// Mail the transcript to the account's own address.
pub async fn email_transcript(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let found = owned_session(&pool, &viewer, path.into_inner()).await?;
    let back = format!("/tutor/history/{}", found.id);

    let me = user::find_by_id(&pool, viewer.user_id).await?.ok_or(AppError::NotFound)?;
    if me.email.is_empty() {
        return Ok(flash_redirect(&session, "Add an email address to your profile first", &back));
    }

    let transcript = tutor::messages(&pool, found.id).await?;
    let mail = messages::tutor_transcript(services.app_name(), &me, &found, &transcript);
    let message = if services.notifier.send(&mail).await {
        format!("Transcript sent to {}", me.email)
    } else {
        "The transcript could not be sent. Please try again later.".to_string()
    };
    Ok(flash_redirect(&session, message, &back))
}
