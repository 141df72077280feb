use actix_session::Session;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::policy::{can_manage, can_view, require_manage, require_view};
use crate::auth::session::current_viewer;
use crate::errors::{AppError, render};
use crate::handlers::{CsrfOnly, flash_redirect, json_error};
use crate::models::conference::{self, ConferenceStatus};
use crate::services::Services;
use crate::services::meeting::recordings::{self, ImportError};
use crate::services::meeting::{MeetingRequest, sdk_signature};
use crate::templates_structs::{ConferenceJoinTemplate, PageContext};

/// Join page. Refreshes the clock-derived status and records attendance.
pub async fn join(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let mut found = conference::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_view(&viewer, &found)?;

    conference::refresh_status(&pool, &mut found, Utc::now()).await?;
    match found.status() {
        ConferenceStatus::Cancelled => {
            return Ok(flash_redirect(&session, "This class was cancelled", &format!("/conferences/{}", found.id)));
        }
        ConferenceStatus::Completed => {
            return Ok(flash_redirect(&session, "This class has already ended", &format!("/conferences/{}", found.id)));
        }
        _ => {}
    }

    let is_host = found.scheduled_by == viewer.user_id;
    let participant_type = if is_host { "host" } else { viewer.role.as_str() };
    conference::mark_attended(&pool, found.id, viewer.user_id, participant_type).await?;

    let join_url = if is_host && !found.start_url.is_empty() {
        found.start_url.clone()
    } else {
        found.meeting_link.clone()
    };
    let zoom = services.zoom();
    let sdk_enabled = found.is_zoom()
        && !found.meeting_id.is_empty()
        && zoom.sdk_key.is_some()
        && zoom.sdk_secret.is_some();

    let ctx = PageContext::build(&session, &pool, &viewer, "/conferences").await?;
    render(ConferenceJoinTemplate { ctx, conference: found, is_host, sdk_enabled, join_url })
}

/// Meeting SDK signature for the embedded client.
pub async fn signature(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let Some(found) = conference::find_by_id(&pool, path.into_inner()).await? else {
        return Ok(json_error(StatusCode::NOT_FOUND, "Conference not found"));
    };
    if !can_view(&viewer, &found) {
        return Ok(json_error(StatusCode::FORBIDDEN, "Access denied"));
    }
    if !found.is_zoom() || found.meeting_id.is_empty() {
        return Ok(json_error(StatusCode::BAD_REQUEST, "This class has no Zoom meeting"));
    }

    let zoom = services.zoom();
    let (Some(key), Some(secret)) = (zoom.sdk_key.as_deref(), zoom.sdk_secret.as_deref()) else {
        return Ok(json_error(StatusCode::SERVICE_UNAVAILABLE, "Zoom SDK is not configured"));
    };

    let role = if can_manage(&viewer, &found) { 1 } else { 0 };
    match sdk_signature(key, secret, &found.meeting_id, role, Utc::now()) {
        Ok(signature) => Ok(HttpResponse::Ok().json(json!({
            "ok": true,
            "signature": signature,
            "sdk_key": key,
            "meeting_number": found.meeting_id,
            "password": found.meeting_password,
            "user_name": viewer.name(),
            "user_email": viewer.email,
            "role": role,
        }))),
        Err(e) => {
            log::error!("SDK signature for conference {} failed: {e}", found.id);
            Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, "Could not sign the meeting"))
        }
    }
}

pub async fn toggle_auto_record(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let found = conference::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;

    let enabled = !found.auto_record;
    conference::set_auto_record(&pool, found.id, enabled).await?;
    let mut message = if enabled { "Auto-recording enabled" } else { "Auto-recording disabled" }.to_string();

    if found.is_zoom() && !found.meeting_id.is_empty() {
        let req = MeetingRequest::for_conference(
            &found.title,
            &found.description,
            found.start_time,
            found.end_time,
            &found.meeting_password,
            &found.class_level,
            enabled,
        );
        if let Err(failure) = services
            .meetings
            .update(found.scheduled_by, &found.meeting_id, &req, found.used_oauth)
            .await
        {
            log::warn!("Recording setting for meeting {} not synced: {failure}", found.meeting_id);
            message = format!("{message} here, but Zoom was not updated ({failure}).");
        }
    }

    Ok(flash_redirect(&session, message, &format!("/conferences/{}", found.id)))
}

/// Copy cloud recordings into storage as recorded sessions.
pub async fn import_recordings(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let found = conference::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;
    let back = format!("/conferences/{}", found.id);

    let message = match recordings::import(&pool, &services.meetings, services.storage.as_ref(), &found, viewer.user_id).await {
        Ok(outcome) if outcome.failed == 0 => {
            format!("Imported {} recording(s)", outcome.recording_ids.len())
        }
        Ok(outcome) if outcome.recording_ids.is_empty() => {
            format!("All {} recording file(s) failed to import", outcome.failed)
        }
        Ok(outcome) => format!(
            "Imported {} recording(s); {} file(s) failed",
            outcome.recording_ids.len(),
            outcome.failed
        ),
        Err(ImportError::Db(e)) => return Err(e.into()),
        Err(e) => {
            log::warn!("Recording import for conference {} failed: {e}", found.id);
            e.to_string()
        }
    };

    Ok(flash_redirect(&session, message, &back))
}
