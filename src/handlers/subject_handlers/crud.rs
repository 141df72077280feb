use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::policy::require_admin;
use crate::auth::session::current_viewer;
use crate::auth::{csrf, validate};
use crate::errors::{AppError, is_unique_violation, render};
use crate::handlers::{CsrfOnly, flash_redirect};
use crate::models::class_level;
use crate::models::class_subject;
use crate::models::subject::{self, DeleteOutcome, SubjectForm};
use crate::templates_structs::{
    PageContext, SubjectDeleteTemplate, SubjectDetailTemplate, SubjectFormTemplate, SubjectListTemplate,
};

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/subjects").await?;
    let subjects = subject::find_all(&pool).await?;
    render(SubjectListTemplate { ctx, subjects })
}

pub async fn detail(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let id = path.into_inner();
    let found = subject::find_by_id(&pool, id).await?.ok_or(AppError::NotFound)?;
    let usage = subject::usage(&pool, id).await?;
    let classes = class_subject::find_all(&pool, None)
        .await?
        .into_iter()
        .filter(|cs| cs.subject_id == id)
        .map(|cs| class_level::label(&cs.class_level))
        .collect();

    let ctx = PageContext::build(&session, &pool, &viewer, "/subjects").await?;
    render(SubjectDetailTemplate { ctx, subject: found, usage, classes })
}

fn form_errors(form: &SubjectForm) -> Vec<String> {
    let mut errors = vec![];
    errors.extend(validate::validate_required(&form.name, "Name", 100));
    errors.extend(validate::validate_optional(&form.description, "Description", 2000));
    errors.extend(validate::validate_optional(&form.icon, "Icon", 50));
    errors
}

pub async fn new_form(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/subjects").await?;

    render(SubjectFormTemplate {
        ctx,
        form_action: "/subjects".to_string(),
        form_title: "New Subject".to_string(),
        name: String::new(),
        description: String::new(),
        icon: String::new(),
        errors: vec![],
    })
}

pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<SubjectForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;

    let mut errors = form_errors(&form);
    if errors.is_empty() {
        match subject::create(&pool, form.name.trim(), form.description.trim(), form.icon.trim()).await {
            Ok(id) => {
                log::info!("Subject {id} '{}' created by user {}", form.name.trim(), viewer.user_id);
                return Ok(flash_redirect(&session, "Subject created", &format!("/subjects/{id}")));
            }
            Err(e) if is_unique_violation(&e) => errors.push("A subject with that name already exists".to_string()),
            Err(e) => return Err(e.into()),
        }
    }

    let ctx = PageContext::build(&session, &pool, &viewer, "/subjects").await?;
    render(SubjectFormTemplate {
        ctx,
        form_action: "/subjects".to_string(),
        form_title: "New Subject".to_string(),
        name: form.name.clone(),
        description: form.description.clone(),
        icon: form.icon.clone(),
        errors,
    })
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let id = path.into_inner();
    let found = subject::find_by_id(&pool, id).await?.ok_or(AppError::NotFound)?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/subjects").await?;

    render(SubjectFormTemplate {
        ctx,
        form_action: format!("/subjects/{id}"),
        form_title: format!("Edit {}", found.name),
        name: found.name,
        description: found.description,
        icon: found.icon,
        errors: vec![],
    })
}

pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<SubjectForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let id = path.into_inner();

    let mut errors = form_errors(&form);
    if errors.is_empty() {
        match subject::update(&pool, id, form.name.trim(), form.description.trim(), form.icon.trim()).await {
            Ok(true) => return Ok(flash_redirect(&session, "Subject updated", &format!("/subjects/{id}"))),
            Ok(false) => return Err(AppError::NotFound),
            Err(e) if is_unique_violation(&e) => errors.push("A subject with that name already exists".to_string()),
            Err(e) => return Err(e.into()),
        }
    }

    let ctx = PageContext::build(&session, &pool, &viewer, "/subjects").await?;
    render(SubjectFormTemplate {
        ctx,
        form_action: format!("/subjects/{id}"),
        form_title: "Edit Subject".to_string(),
        name: form.name.clone(),
        description: form.description.clone(),
        icon: form.icon.clone(),
        errors,
    })
}

/// Usage report shown before deleting.
pub async fn delete_confirm(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let id = path.into_inner();
    let found = subject::find_by_id(&pool, id).await?.ok_or(AppError::NotFound)?;
    let usage = subject::usage(&pool, id).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/subjects").await?;
    render(SubjectDeleteTemplate { ctx, subject: found, usage })
}

/// Refuses while anything still references the subject.
pub async fn delete(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let id = path.into_inner();

    match subject::delete_if_unused(&pool, id).await? {
        DeleteOutcome::Deleted => {
            log::info!("Subject {id} deleted by user {}", viewer.user_id);
            Ok(flash_redirect(&session, "Subject deleted", "/subjects"))
        }
        DeleteOutcome::InUse(usage) => {
            log::warn!("Refused to delete subject {id}: {}", usage.summary());
            let message = format!("Cannot delete this subject. It is still used by {}.", usage.summary());
            Ok(flash_redirect(&session, message, &format!("/subjects/{id}/delete")))
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound),
    }
}
