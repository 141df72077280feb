use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::policy::{Viewer, require_staff};
use crate::auth::session::current_viewer;
use crate::errors::{AppError, is_unique_violation, render};
use crate::handlers::{CsrfOnly, flash_redirect};
use crate::models::class_level;
use crate::models::class_subject::{self, ClassSubject, ClassSubjectForm};
use crate::models::subject;
use crate::templates_structs::{ClassSubjectListTemplate, PageContext, class_options, subject_options};

const LIST_PATH: &str = "/class-subjects";

/// Teachers manage the assignments they made; admins manage all.
fn require_owner(viewer: &Viewer, item: &ClassSubject) -> Result<(), AppError> {
    if viewer.is_admin() || item.assigned_by == Some(viewer.user_id) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "user {} did not make class-subject assignment {}",
            viewer.user_id, item.id
        )))
    }
}

async fn validated(pool: &PgPool, form: &ClassSubjectForm) -> Result<Result<String, String>, AppError> {
    let level = form.class_level.trim();
    if !class_level::is_valid(level) {
        return Ok(Err("Choose a valid class level".to_string()));
    }
    if subject::find_by_id(pool, form.subject_id).await?.is_none() {
        return Ok(Err("Choose a valid subject".to_string()));
    }
    Ok(Ok(level.to_string()))
}

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let owner_filter = if viewer.is_admin() { None } else { Some(viewer.user_id) };
    let assignments = class_subject::find_all(&pool, owner_filter).await?;
    let subjects = subject::find_all(&pool).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, LIST_PATH).await?;

    render(ClassSubjectListTemplate {
        ctx,
        assignments,
        subjects: subject_options(&subjects),
        classes: class_options(),
    })
}

pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<ClassSubjectForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let level = match validated(&pool, &form).await? {
        Ok(level) => level,
        Err(message) => return Ok(flash_redirect(&session, message, LIST_PATH)),
    };

    let message = match class_subject::create(&pool, &level, form.subject_id, viewer.user_id).await? {
        Some(id) => {
            log::info!("Class-subject {id} ({level}, subject {}) assigned by user {}", form.subject_id, viewer.user_id);
            format!("Subject assigned to {}", class_level::label(&level))
        }
        None => format!("That subject is already assigned to {}", class_level::label(&level)),
    };
    Ok(flash_redirect(&session, message, LIST_PATH))
}

pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<ClassSubjectForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let existing = class_subject::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_owner(&viewer, &existing)?;

    let level = match validated(&pool, &form).await? {
        Ok(level) => level,
        Err(message) => return Ok(flash_redirect(&session, message, LIST_PATH)),
    };

    match class_subject::update(&pool, existing.id, &level, form.subject_id).await {
        Ok(()) => Ok(flash_redirect(&session, "Assignment updated", LIST_PATH)),
        Err(e) if is_unique_violation(&e) => Ok(flash_redirect(
            &session,
            format!("That subject is already assigned to {}", class_level::label(&level)),
            LIST_PATH,
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let existing = class_subject::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_owner(&viewer, &existing)?;

    class_subject::delete(&pool, existing.id).await?;
    Ok(flash_redirect(&session, "Assignment removed", LIST_PATH))
}
