use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;

use crate::auth::policy::{ListScope, Viewer, can_manage, require_manage, require_staff, require_view};
use crate::auth::session::current_viewer;
use crate::auth::{csrf, validate};
use crate::errors::{AppError, render};
use crate::handlers::{CsrfOnly, check_placement, flash_redirect};
use crate::models::conference::parse_local_datetime;
use crate::models::recording::{self, NewRecording, Recording, RecordingFilter, RecordingForm, StorageType};
use crate::models::subject;
use crate::services::Services;
use crate::templates_structs::{
    PageContext, RecordingDetailTemplate, RecordingFormTemplate, RecordingListTemplate, class_options,
    subject_options,
};

const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<RecordingFilter>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let filter = query.into_inner();
    let recordings = recording::find_visible(&pool, &ListScope::for_viewer(&viewer), &filter).await?;
    let subjects = subject::find_all(&pool).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/recordings").await?;

    render(RecordingListTemplate {
        ctx,
        recordings,
        subjects: subject_options(&subjects),
        classes: class_options(),
        q: filter.q.unwrap_or_default(),
        subject_filter: filter.subject.unwrap_or(0),
        class_filter: filter.class_level.unwrap_or_default(),
    })
}

pub async fn detail(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = recording::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_view(&viewer, &found)?;

    let video_url = match (found.storage(), &services.storage) {
        (StorageType::S3, Some(store)) if !found.s3_object_key.is_empty() => {
            match store.presigned_url(&found.s3_object_key).await {
                Ok(url) => Some(url),
                Err(e) => {
                    log::error!("Presigning recording {} failed: {e}", found.id);
                    None
                }
            }
        }
        (StorageType::S3, _) => None,
        _ => Some(found.recording_url.clone()).filter(|u| !u.is_empty()),
    };

    recording::increment_views(&pool, found.id).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/recordings").await?;
    render(RecordingDetailTemplate {
        ctx,
        can_manage: can_manage(&viewer, &found),
        recording: found,
        video_url,
    })
}

struct FormState<'a> {
    action: String,
    title: &'a str,
    errors: Vec<String>,
}

async fn form_page(
    session: &Session,
    pool: &PgPool,
    services: &Services,
    viewer: &Viewer,
    state: FormState<'_>,
    form: &RecordingForm,
) -> Result<HttpResponse, AppError> {
    let subjects = subject::find_all(pool).await?;
    let ctx = PageContext::build(session, pool, viewer, "/recordings").await?;
    render(RecordingFormTemplate {
        ctx,
        form_action: state.action,
        form_title: state.title.to_string(),
        subjects: subject_options(&subjects),
        classes: class_options(),
        errors: state.errors,
        title: form.title.clone(),
        description: form.description.clone(),
        subject_id: form.subject_id,
        class_level: form.class_level.clone(),
        recording_url: form.recording_url.clone(),
        s3_object_key: form.s3_object_key.clone(),
        thumbnail_url: form.thumbnail_url.clone(),
        duration_minutes: form.duration_minutes,
        recorded_date: form.recorded_date.clone(),
        storage_enabled: services.storage.is_some(),
    })
}

fn blank_form(viewer: &Viewer) -> RecordingForm {
    RecordingForm {
        title: String::new(),
        description: String::new(),
        subject_id: 0,
        class_level: viewer.class_level.clone().unwrap_or_default(),
        recording_url: String::new(),
        s3_object_key: String::new(),
        thumbnail_url: String::new(),
        duration_minutes: 0,
        recorded_date: Utc::now().format(INPUT_FORMAT).to_string(),
        csrf_token: String::new(),
    }
}

fn form_from(r: &Recording) -> RecordingForm {
    RecordingForm {
        title: r.title.clone(),
        description: r.description.clone(),
        subject_id: r.subject_id,
        class_level: r.class_level.clone(),
        recording_url: r.recording_url.clone(),
        s3_object_key: r.s3_object_key.clone(),
        thumbnail_url: r.thumbnail_url.clone(),
        duration_minutes: r.duration_minutes,
        recorded_date: r.recorded_date.format(INPUT_FORMAT).to_string(),
        csrf_token: String::new(),
    }
}

/// Either a link or a storage key; the key wins when both are given.
async fn check_form(
    pool: &PgPool,
    services: &Services,
    viewer: &Viewer,
    form: &RecordingForm,
) -> Result<Result<NewRecording, Vec<String>>, AppError> {
    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_required(&form.title, "Title", 200));
    errors.extend(validate::validate_optional(&form.description, "Description", 5000));
    check_placement(pool, form.subject_id, &form.class_level, &mut errors).await?;

    let url = form.recording_url.trim();
    let key = form.s3_object_key.trim();
    let storage_type = if !key.is_empty() {
        if services.storage.is_none() {
            errors.push("Recording storage is not configured; provide a link instead".to_string());
        }
        StorageType::S3
    } else if url.is_empty() {
        errors.push("Provide a recording link or a storage key".to_string());
        StorageType::Url
    } else {
        errors.extend(validate::validate_url(url, "Recording link"));
        StorageType::Url
    };

    let thumbnail = form.thumbnail_url.trim();
    if !thumbnail.is_empty() {
        errors.extend(validate::validate_url(thumbnail, "Thumbnail"));
    }
    if form.duration_minutes < 0 {
        errors.push("Duration cannot be negative".to_string());
    }

    let recorded_date = if form.recorded_date.trim().is_empty() {
        Some(Utc::now())
    } else {
        parse_local_datetime(&form.recorded_date)
    };
    let Some(recorded_date) = recorded_date else {
        errors.push("Recorded date is not a valid date".to_string());
        return Ok(Err(errors));
    };

    if !errors.is_empty() {
        return Ok(Err(errors));
    }

    Ok(Ok(NewRecording {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        subject_id: form.subject_id,
        class_level: form.class_level.trim().to_string(),
        recording_url: if storage_type == StorageType::S3 { String::new() } else { url.to_string() },
        thumbnail_url: thumbnail.to_string(),
        uploaded_by: viewer.user_id,
        duration_minutes: form.duration_minutes,
        recorded_date,
        storage_type,
        s3_object_key: key.to_string(),
        file_size_mb: 0.0,
        conference_id: None,
    }))
}

pub async fn new_form(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;
    let state = FormState { action: "/recordings".to_string(), title: "Add Recording", errors: vec![] };
    form_page(&session, &pool, &services, &viewer, state, &blank_form(&viewer)).await
}

pub async fn create(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<RecordingForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let new = match check_form(&pool, &services, &viewer, &form).await? {
        Ok(new) => new,
        Err(errors) => {
            let state = FormState { action: "/recordings".to_string(), title: "Add Recording", errors };
            return form_page(&session, &pool, &services, &viewer, state, &form).await;
        }
    };

    let id = recording::create(&pool, &new).await?;
    log::info!("Recording {id} '{}' added by user {}", new.title, viewer.user_id);
    Ok(flash_redirect(&session, "Recording added", &format!("/recordings/{id}")))
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = recording::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;

    let state = FormState { action: format!("/recordings/{}", found.id), title: "Edit Recording", errors: vec![] };
    form_page(&session, &pool, &services, &viewer, state, &form_from(&found)).await
}

pub async fn update(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<RecordingForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let existing = recording::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &existing)?;
    let action = format!("/recordings/{}", existing.id);

    let new = match check_form(&pool, &services, &viewer, &form).await? {
        Ok(new) => new,
        Err(errors) => {
            let state = FormState { action, title: "Edit Recording", errors };
            return form_page(&session, &pool, &services, &viewer, state, &form).await;
        }
    };

    recording::update(&pool, existing.id, &new).await?;
    Ok(flash_redirect(&session, "Recording updated", &action))
}

/// Removes the stored object too when the recording lives in storage.
pub async fn delete(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let existing = recording::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &existing)?;

    let mut message = "Recording deleted".to_string();
    if existing.storage() == StorageType::S3 && !existing.s3_object_key.is_empty() {
        match &services.storage {
            Some(store) => {
                if let Err(e) = store.delete(&existing.s3_object_key).await {
                    log::warn!("Stored object {} not deleted: {e}", existing.s3_object_key);
                    message = "Recording deleted, but its stored file could not be removed".to_string();
                }
            }
            None => log::warn!("Storage not configured; leaving object {}", existing.s3_object_key),
        }
    }

    recording::delete(&pool, existing.id).await?;
    log::info!("Recording {} deleted by user {}", existing.id, viewer.user_id);
    Ok(flash_redirect(&session, message, "/recordings"))
}
