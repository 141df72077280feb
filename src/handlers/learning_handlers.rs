use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::policy::require_role;
use crate::auth::session::current_viewer;
use crate::errors::{AppError, render};
use crate::handlers::{CsrfOnly, flash_redirect};
use crate::models::insights;
use crate::models::user::{self, Role};
use crate::services::Services;
use crate::services::notify::messages;
use crate::templates_structs::{ImprovementAreasTemplate, PageContext, WeeklySummaryTemplate};

pub async fn weekly_summary(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_role(&viewer, &[Role::Student])?;

    let summary = insights::weekly_summary(&pool, viewer.user_id, viewer.class_level.as_deref(), Utc::now()).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/learning").await?;
    render(WeeklySummaryTemplate { ctx, summary })
}

/// Sent on request regardless of the weekly-summary preference, which only
/// governs unsolicited mail.
pub async fn email_weekly_summary(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_role(&viewer, &[Role::Student])?;
    let back = "/learning/weekly-summary";

    let me = user::find_by_id(&pool, viewer.user_id).await?.ok_or(AppError::NotFound)?;
    if me.email.is_empty() {
        return Ok(flash_redirect(&session, "Add an email address to your profile first", back));
    }

    let summary = insights::weekly_summary(&pool, me.id, me.class_level.as_deref(), Utc::now()).await?;
    let mail = messages::weekly_summary(services.app_name(), &me, &summary);
    let message = if services.notifier.send(&mail).await {
        log::info!("Weekly summary sent to user {}", me.id);
        format!("Weekly summary sent to {}", me.email)
    } else {
        "The summary could not be sent. Please try again later.".to_string()
    };
    Ok(flash_redirect(&session, message, back))
}

pub async fn improvement_areas(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_role(&viewer, &[Role::Student])?;

    let areas = insights::improvement_areas(&pool, viewer.user_id, viewer.class_level.as_deref(), Utc::now()).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/learning").await?;
    render(ImprovementAreasTemplate { ctx, areas })
}
