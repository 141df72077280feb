use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::policy::require_staff;
use crate::auth::session::current_viewer;
use crate::errors::{AppError, render};
use crate::handlers::{CsrfOnly, flash_redirect, see_other};
use crate::models::{conference, oauth_token};
use crate::services::Services;
use crate::services::meeting::MeetingError;
use crate::templates_structs::{AccountMeetingRow, PageContext, ZoomMeetingsTemplate};

const STATE_KEY: &str = "zoom_oauth_state";

/// Send a teacher to the provider's consent screen.
pub async fn authorize(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let Some(oauth) = &services.zoom_oauth else {
        return Ok(flash_redirect(&session, "Zoom OAuth is not configured", "/dashboard"));
    };

    let state = csrf::generate_token();
    session
        .insert(STATE_KEY, &state)
        .map_err(|e| AppError::Session(e.to_string()))?;
    Ok(see_other(&oauth.authorize_url(&state)))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn callback(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    query: web::Query<CallbackQuery>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let expected = session.get::<String>(STATE_KEY).unwrap_or(None);
    session.remove(STATE_KEY);

    if let Some(error) = &query.error {
        log::warn!("Zoom authorization declined for user {}: {error}", viewer.user_id);
        return Ok(flash_redirect(&session, "Zoom authorization was cancelled", "/dashboard"));
    }

    let state_ok = match (&expected, &query.state) {
        (Some(expected), Some(got)) => csrf::constant_time_eq(expected, got),
        _ => false,
    };
    if !state_ok {
        log::warn!("Zoom OAuth state mismatch for user {}", viewer.user_id);
        return Err(AppError::Csrf);
    }

    let (Some(oauth), Some(code)) = (&services.zoom_oauth, query.code.as_deref()) else {
        return Ok(flash_redirect(&session, "Zoom did not return an authorization code", "/dashboard"));
    };

    match oauth.exchange_code(code).await {
        Ok(tokens) => {
            let previous = oauth_token::find_for_user(&pool, viewer.user_id)
                .await?
                .map(|t| t.refresh_token)
                .unwrap_or_default();
            oauth_token::save(&pool, &tokens.into_stored(viewer.user_id, &previous)).await?;
            log::info!("User {} connected a Zoom account", viewer.user_id);
            Ok(flash_redirect(&session, "Zoom account connected", "/dashboard"))
        }
        Err(e) => {
            log::error!("Zoom code exchange for user {} failed: {e}", viewer.user_id);
            Ok(flash_redirect(&session, format!("Could not connect Zoom: {e}"), "/dashboard"))
        }
    }
}

/// Upcoming meetings on the viewer's connected Zoom account, matched to the
/// local classes that use them.
pub async fn meetings(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let Some(account) = &services.zoom_account else {
        return Ok(flash_redirect(&session, "Zoom OAuth is not configured", "/conferences"));
    };

    let has_token = oauth_token::find_for_user(&pool, viewer.user_id).await?.is_some();
    let (listed, error) = if !has_token {
        (vec![], None)
    } else {
        match account.upcoming(viewer.user_id).await {
            Ok(listed) => (listed, None),
            Err(e) => {
                log::warn!("Listing Zoom meetings for user {} failed: {e}", viewer.user_id);
                (vec![], Some(e.to_string()))
            }
        }
    };

    let ids: Vec<String> = listed.iter().map(|m| m.id()).collect();
    let linked = conference::find_by_meeting_ids(&pool, &ids).await?;
    let meetings = listed
        .into_iter()
        .map(|m| {
            let meeting_id = m.id();
            let conference = linked
                .iter()
                .find(|c| c.meeting_id == meeting_id)
                .map(|c| (c.id, c.title.clone()));
            AccountMeetingRow {
                starts: m.start_time.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_default(),
                meeting_id,
                topic: m.topic,
                duration: m.duration,
                join_url: m.join_url,
                conference,
            }
        })
        .collect();

    let ctx = PageContext::build(&session, &pool, &viewer, "/conferences").await?;
    render(ZoomMeetingsTemplate { ctx, meetings, error, has_token })
}

/// Remove a meeting that no local class uses. Linked meetings go with their
/// class.
pub async fn delete_meeting(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;
    let meeting_id = path.into_inner();

    let Some(account) = &services.zoom_account else {
        return Ok(flash_redirect(&session, "Zoom OAuth is not configured", "/conferences"));
    };

    if let Some(linked) = conference::find_by_meeting_ids(&pool, std::slice::from_ref(&meeting_id))
        .await?
        .into_iter()
        .next()
    {
        let message = format!("Meeting {meeting_id} belongs to '{}'. Delete the class instead.", linked.title);
        return Ok(flash_redirect(&session, message, &format!("/conferences/{}", linked.id)));
    }

    let message = match account.delete(viewer.user_id, &meeting_id).await {
        Ok(()) => {
            log::info!("User {} deleted Zoom meeting {meeting_id}", viewer.user_id);
            format!("Zoom meeting {meeting_id} deleted")
        }
        Err(MeetingError::NoToken) => "Connect your Zoom account first".to_string(),
        Err(e) => {
            log::warn!("Deleting Zoom meeting {meeting_id} for user {} failed: {e}", viewer.user_id);
            format!("Could not delete the Zoom meeting: {e}")
        }
    };
    Ok(flash_redirect(&session, message, "/zoom/meetings"))
}
