use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::auth::policy::{ListScope, Viewer, can_manage, require_manage, require_staff, require_view};
use crate::auth::session::current_viewer;
use crate::auth::{csrf, validate};
use crate::errors::{AppError, render};
use crate::handlers::{CsrfOnly, check_placement, flash_redirect};
use crate::models::conference::{
    self, Conference, ConferenceForm, NewConference, PLATFORMS, RemoteMeeting, parse_local_datetime,
};
use crate::models::settings::{self, NotificationKind};
use crate::models::user;
use crate::models::{class_level, subject};
use crate::services::Services;
use crate::services::meeting::MeetingRequest;
use crate::services::notify::messages;
use crate::templates_structs::{
    ConferenceDetailTemplate, ConferenceFormTemplate, ConferenceListTemplate, ConferenceValues, InviteeOption,
    PageContext, class_options, subject_options,
};

const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let scope = ListScope::for_viewer(&viewer);
    let now = Utc::now();

    let (upcoming, mut past): (Vec<_>, Vec<_>) = conference::find_visible(&pool, &scope)
        .await?
        .into_iter()
        .partition(|c| c.is_upcoming(now));
    past.reverse();

    let ctx = PageContext::build(&session, &pool, &viewer, "/conferences").await?;
    render(ConferenceListTemplate { ctx, upcoming, past })
}

pub async fn detail(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let mut found = conference::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_view(&viewer, &found)?;
    conference::refresh_status(&pool, &mut found, Utc::now()).await?;

    let participants = conference::participants(&pool, found.id).await?;
    let recording_id = found
        .recording_url
        .strip_prefix("/recordings/")
        .and_then(|id| id.parse().ok());
    let ctx = PageContext::build(&session, &pool, &viewer, "/conferences").await?;

    render(ConferenceDetailTemplate {
        ctx,
        can_manage: can_manage(&viewer, &found),
        conference: found,
        participants,
        recording_id,
        storage_enabled: services.storage.is_some(),
        zoom_enabled: services.meetings.is_configured(),
    })
}

/// Validated form contents, or the messages to show.
struct Checked {
    new: NewConference,
    invitees: Vec<i64>,
}

async fn check_form(pool: &PgPool, viewer: &Viewer, form: &ConferenceForm) -> Result<Result<Checked, Vec<String>>, AppError> {
    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_required(&form.title, "Title", 200));
    errors.extend(validate::validate_optional(&form.description, "Description", 5000));
    check_placement(pool, form.subject_id, &form.class_level, &mut errors).await?;

    if !PLATFORMS.iter().any(|(code, _)| *code == form.platform) {
        errors.push("Choose a valid platform".to_string());
    }

    let start = parse_local_datetime(&form.start_time);
    let end = parse_local_datetime(&form.end_time);
    match (start, end) {
        (Some(s), Some(e)) if e <= s => errors.push("End time must be after the start time".to_string()),
        (None, _) => errors.push("Start time is required".to_string()),
        (_, None) => errors.push("End time is required".to_string()),
        _ => {}
    }

    let link = form.meeting_link.trim();
    if !link.is_empty() {
        errors.extend(validate::validate_url(link, "Meeting link"));
    }

    if !errors.is_empty() {
        return Ok(Err(errors));
    }
    let (Some(start_time), Some(end_time)) = (start, end) else {
        return Ok(Err(vec!["Invalid time range".to_string()]));
    };

    Ok(Ok(Checked {
        new: NewConference {
            title: form.title.trim().to_string(),
            description: form.description.trim().to_string(),
            subject_id: form.subject_id,
            class_level: form.class_level.trim().to_string(),
            platform: form.platform.clone(),
            meeting_link: link.to_string(),
            meeting_password: form.meeting_password.trim().to_string(),
            scheduled_by: viewer.user_id,
            start_time,
            end_time,
            auto_record: form.auto_record.is_some(),
        },
        invitees: form.participant_ids(),
    }))
}

fn values_from_form(form: &ConferenceForm) -> ConferenceValues {
    ConferenceValues {
        title: form.title.clone(),
        description: form.description.clone(),
        subject_id: form.subject_id,
        class_level: form.class_level.clone(),
        platform: form.platform.clone(),
        start_time: form.start_time.clone(),
        end_time: form.end_time.clone(),
        meeting_link: form.meeting_link.clone(),
        meeting_password: form.meeting_password.clone(),
        auto_record: form.auto_record.is_some(),
    }
}

fn values_from_conference(c: &Conference) -> ConferenceValues {
    ConferenceValues {
        title: c.title.clone(),
        description: c.description.clone(),
        subject_id: c.subject_id,
        class_level: c.class_level.clone(),
        platform: c.platform.clone(),
        start_time: c.start_time.format(INPUT_FORMAT).to_string(),
        end_time: c.end_time.format(INPUT_FORMAT).to_string(),
        meeting_link: c.meeting_link.clone(),
        meeting_password: c.meeting_password.clone(),
        auto_record: c.auto_record,
    }
}

#[allow(clippy::too_many_arguments)]
async fn form_page(
    session: &Session,
    pool: &PgPool,
    services: &Services,
    viewer: &Viewer,
    form_action: String,
    form_title: String,
    is_edit: bool,
    values: ConferenceValues,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let subjects = subject::find_all(pool).await?;
    let invitees = if is_edit {
        vec![]
    } else {
        user::find_active_students(pool)
            .await?
            .into_iter()
            .map(|s| InviteeOption {
                id: s.id,
                label: format!(
                    "{} ({})",
                    if s.display_name.is_empty() { &s.username } else { &s.display_name },
                    s.class_label()
                ),
                class_level: s.class_level.clone().unwrap_or_default(),
            })
            .collect()
    };
    let ctx = PageContext::build(session, pool, viewer, "/conferences").await?;

    render(ConferenceFormTemplate {
        ctx,
        form_action,
        form_title,
        is_edit,
        values,
        subjects: subject_options(&subjects),
        classes: class_options(),
        platforms: PLATFORMS.to_vec(),
        invitees,
        errors,
        zoom_enabled: services.meetings.is_configured(),
    })
}

pub async fn new_form(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let values = ConferenceValues {
        platform: "zoom".to_string(),
        class_level: viewer.class_level.clone().unwrap_or_default(),
        ..Default::default()
    };
    form_page(&session, &pool, &services, &viewer, "/conferences".to_string(), "Schedule a Class".to_string(), false, values, vec![]).await
}

fn meeting_request(new: &NewConference) -> MeetingRequest {
    MeetingRequest::for_conference(
        &new.title,
        &new.description,
        new.start_time,
        new.end_time,
        &new.meeting_password,
        &new.class_level,
        new.auto_record,
    )
}

/// Saves locally first; a provider failure only downgrades to a warning.
/// A link typed into the form stays as the way in until Zoom replaces it.
pub async fn create(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<ConferenceForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;
    let new_action = || "/conferences".to_string();
    let new_title = || "Schedule a Class".to_string();

    let checked = match check_form(&pool, &viewer, &form).await? {
        Ok(checked) => checked,
        Err(errors) => {
            return form_page(&session, &pool, &services, &viewer, new_action(), new_title(), false, values_from_form(&form), errors).await;
        }
    };

    let use_zoom = checked.new.platform == "zoom" && services.meetings.is_configured();
    if !use_zoom && checked.new.meeting_link.is_empty() {
        let errors = vec!["A meeting link is required when the meeting is not created on Zoom".to_string()];
        return form_page(&session, &pool, &services, &viewer, new_action(), new_title(), false, values_from_form(&form), errors).await;
    }

    let invitees = conference::resolve_invitees(&pool, &checked.new.class_level, &checked.invitees).await?;
    if !invitees.rejected.is_empty() {
        log::warn!(
            "User {} tried to invite {:?} outside class {}",
            viewer.user_id, invitees.rejected, checked.new.class_level
        );
        let errors = vec![format!(
            "{} selected invitee(s) are not active students of {}",
            invitees.rejected.len(),
            class_level::label(&checked.new.class_level)
        )];
        return form_page(&session, &pool, &services, &viewer, new_action(), new_title(), false, values_from_form(&form), errors).await;
    }

    let id = conference::create(&pool, &checked.new).await?;
    log::info!("Conference {id} '{}' scheduled by user {}", checked.new.title, viewer.user_id);

    let mut warning = None;
    if use_zoom {
        if let Err(failure) = create_remote(&pool, &services, id, viewer.user_id, &meeting_request(&checked.new)).await {
            log::warn!("Zoom meeting for conference {id} not created: {failure}");
            warning = Some(if checked.new.meeting_link.is_empty() {
                format!("Class saved, but the Zoom meeting could not be created ({failure}). Retry from the class page.")
            } else {
                format!("Class saved with your meeting link; the Zoom meeting could not be created ({failure}).")
            });
        }
    }

    conference::add_participants(&pool, id, &invitees.accepted, "student").await?;
    conference::add_participants(&pool, id, &[viewer.user_id], "host").await?;

    if let Some(conf) = conference::find_by_id(&pool, id).await? {
        invite(&pool, &services, &conf, &invitees.accepted).await?;
    }

    let message = warning.unwrap_or_else(|| "Class scheduled".to_string());
    Ok(flash_redirect(&session, message, &format!("/conferences/{id}")))
}

/// Create the provider meeting and store its identifiers on the conference.
async fn create_remote(
    pool: &PgPool,
    services: &Services,
    id: i64,
    host_id: i64,
    req: &MeetingRequest,
) -> Result<(), String> {
    let synced = services.meetings.create(host_id, req).await.map_err(|f| f.to_string())?;
    let remote = RemoteMeeting {
        meeting_id: synced.value.id,
        join_url: synced.value.join_url,
        start_url: synced.value.start_url,
        password: synced.value.password,
        used_oauth: synced.used_oauth,
    };
    conference::set_remote(pool, id, &remote).await.map_err(|e| {
        log::error!("Storing Zoom meeting {} on conference {id} failed: {e}", remote.meeting_id);
        "the meeting was created but could not be saved".to_string()
    })
}

/// Second attempt at the provider meeting for a Zoom class saved without one.
pub async fn retry_zoom(
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

    if !found.is_zoom() || !found.meeting_id.is_empty() {
        return Ok(flash_redirect(&session, "This class already has its meeting", &back));
    }
    if !services.meetings.is_configured() {
        return Ok(flash_redirect(&session, "Zoom is not configured", &back));
    }

    let req = MeetingRequest::for_conference(
        &found.title,
        &found.description,
        found.start_time,
        found.end_time,
        &found.meeting_password,
        &found.class_level,
        found.auto_record,
    );
    let message = match create_remote(&pool, &services, found.id, found.scheduled_by, &req).await {
        Ok(()) => {
            log::info!("Zoom meeting for conference {} created on retry by user {}", found.id, viewer.user_id);
            "Zoom meeting created".to_string()
        }
        Err(failure) => {
            log::warn!("Zoom retry for conference {} failed: {failure}", found.id);
            format!("The Zoom meeting could not be created ({failure}).")
        }
    };
    Ok(flash_redirect(&session, message, &back))
}

async fn invite(pool: &PgPool, services: &Services, conf: &Conference, user_ids: &[i64]) -> Result<(), AppError> {
    let join_url = services.config.absolute_url(&format!("/conferences/{}/join", conf.id));
    for to in notified_emails(pool, user_ids).await? {
        let mail = messages::conference_invitation(services.app_name(), &to, conf, &join_url);
        services.notifier.send_in_background(mail);
    }
    Ok(())
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = conference::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;

    form_page(
        &session,
        &pool,
        &services,
        &viewer,
        format!("/conferences/{}", found.id),
        format!("Edit {}", found.title),
        true,
        values_from_conference(&found),
        vec![],
    )
    .await
}

pub async fn update(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<ConferenceForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let existing = conference::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &existing)?;
    let action = format!("/conferences/{}", existing.id);

    let checked = match check_form(&pool, &viewer, &form).await? {
        Ok(checked) => checked,
        Err(errors) => {
            return form_page(&session, &pool, &services, &viewer, action, "Edit Class".to_string(), true, values_from_form(&form), errors).await;
        }
    };

    conference::update_details(&pool, existing.id, &checked.new).await?;

    let mut message = "Class updated".to_string();
    if existing.is_zoom() && !existing.meeting_id.is_empty() {
        let req = meeting_request(&checked.new);
        if let Err(failure) = services
            .meetings
            .update(existing.scheduled_by, &existing.meeting_id, &req, existing.used_oauth)
            .await
        {
            log::warn!("Zoom meeting {} not updated: {failure}", existing.meeting_id);
            message = format!("Class updated, but the Zoom meeting could not be updated ({failure}).");
        }
    }

    Ok(flash_redirect(&session, message, &action))
}

/// The local record is removed even when the provider delete fails.
pub async fn delete(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let existing = conference::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &existing)?;

    let mut message = "Class deleted".to_string();
    if existing.is_zoom() && !existing.meeting_id.is_empty() {
        if let Err(failure) = services
            .meetings
            .delete(existing.scheduled_by, &existing.meeting_id, existing.used_oauth)
            .await
        {
            log::warn!("Zoom meeting {} not deleted remotely: {failure}", existing.meeting_id);
            message = format!("Class deleted here, but the Zoom meeting could not be removed ({failure}).");
        }
    }

    if is_future(&existing, Utc::now()) {
        let ids: Vec<i64> = conference::participants(&pool, existing.id)
            .await?
            .into_iter()
            .filter(|p| p.user_id != viewer.user_id)
            .map(|p| p.user_id)
            .collect();
        for to in notified_emails(&pool, &ids).await? {
            let mail = messages::conference_cancelled(services.app_name(), &to, &existing);
            services.notifier.send_in_background(mail);
        }
    }

    conference::delete(&pool, existing.id).await?;
    log::info!("Conference {} deleted by user {}", existing.id, viewer.user_id);
    Ok(flash_redirect(&session, message, "/conferences"))
}

fn is_future(conf: &Conference, now: DateTime<Utc>) -> bool {
    conf.start_time > now
}

async fn notified_emails(pool: &PgPool, ids: &[i64]) -> Result<Vec<String>, AppError> {
    let opted = settings::opted_in(pool, ids, NotificationKind::Meetings).await?;
    Ok(user::find_by_ids(pool, &opted)
        .await?
        .into_iter()
        .map(|u| u.email)
        .filter(|e| !e.is_empty())
        .collect())
}
