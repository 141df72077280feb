use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::policy::{ListScope, require_staff, require_view};
use crate::auth::session::current_viewer;
use crate::auth::{csrf, validate};
use crate::errors::{AppError, render};
use crate::handlers::{check_placement, flash_redirect, see_other};
use crate::models::material::{self, FILE_TYPES, MaterialFilter, MaterialForm, NewMaterial};
use crate::models::subject;
use crate::services::Services;
use crate::services::storage;
use crate::templates_structs::{
    MaterialDetailTemplate, MaterialFormTemplate, MaterialListTemplate, PageContext, class_options,
    subject_options,
};

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<MaterialFilter>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let filter = query.into_inner();
    let scope = ListScope::for_viewer(&viewer);
    let materials = material::find_visible(&pool, &scope, &filter).await?;
    let subjects = subject::find_all(&pool).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/materials").await?;

    render(MaterialListTemplate {
        ctx,
        materials,
        subjects: subject_options(&subjects),
        classes: class_options(),
        file_types: FILE_TYPES.to_vec(),
        q: filter.q.unwrap_or_default(),
        subject_filter: filter.subject.unwrap_or(0),
        class_filter: filter.class_level.unwrap_or_default(),
        type_filter: filter.file_type.unwrap_or_default(),
    })
}

pub async fn detail(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = material::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_view(&viewer, &found)?;

    material::increment_views(&pool, found.id).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/materials").await?;
    render(MaterialDetailTemplate { ctx, material: found })
}

/// Counts the download and redirects to the file, signing stored objects.
pub async fn download(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = material::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_view(&viewer, &found)?;

    let target = match (&found.storage_key, &services.storage) {
        (Some(key), Some(store)) => match store.presigned_url(key).await {
            Ok(url) => url,
            Err(e) => {
                log::error!("Presigning material {} failed: {e}", found.id);
                return Ok(flash_redirect(
                    &session,
                    "The file is temporarily unavailable",
                    &format!("/materials/{}", found.id),
                ));
            }
        },
        _ if !found.file_url.is_empty() => found.file_url.clone(),
        _ => return Err(AppError::NotFound),
    };

    material::increment_downloads(&pool, found.id).await?;
    Ok(see_other(&target))
}

pub async fn new_form(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;
    let subjects = subject::find_all(&pool).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/materials").await?;

    render(MaterialFormTemplate {
        ctx,
        subjects: subject_options(&subjects),
        classes: class_options(),
        file_types: FILE_TYPES.to_vec(),
        errors: vec![],
        title: String::new(),
        description: String::new(),
        subject_id: 0,
        class_level: viewer.class_level.clone().unwrap_or_default(),
        file_type: String::new(),
        file_url: String::new(),
        storage_key: String::new(),
        storage_enabled: services.storage.is_some(),
    })
}

pub async fn create(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<MaterialForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_required(&form.title, "Title", 200));
    errors.extend(validate::validate_optional(&form.description, "Description", 5000));
    check_placement(&pool, form.subject_id, &form.class_level, &mut errors).await?;

    let file_url = form.file_url.trim();
    let raw_key = form.storage_key.trim();
    let class_level = form.class_level.trim();

    let storage_key = match (raw_key.is_empty(), services.storage.is_some()) {
        (true, _) => None,
        (false, true) if raw_key.contains('/') => Some(raw_key.to_string()),
        (false, true) => Some(storage::material_key(class_level, raw_key)),
        (false, false) => {
            errors.push("File storage is not configured; provide a link instead".to_string());
            None
        }
    };
    if storage_key.is_none() {
        if file_url.is_empty() {
            errors.push("Provide a file link or a storage key".to_string());
        } else {
            errors.extend(validate::validate_url(file_url, "File link"));
        }
    }

    let file_type = match form.file_type.trim() {
        "" => material::file_type_for(storage_key.as_deref().unwrap_or(file_url)).to_string(),
        t if FILE_TYPES.iter().any(|(code, _)| *code == t) => t.to_string(),
        _ => {
            errors.push("Choose a valid file type".to_string());
            String::new()
        }
    };

    if !errors.is_empty() {
        let subjects = subject::find_all(&pool).await?;
        let ctx = PageContext::build(&session, &pool, &viewer, "/materials").await?;
        return render(MaterialFormTemplate {
            ctx,
            subjects: subject_options(&subjects),
            classes: class_options(),
            file_types: FILE_TYPES.to_vec(),
            errors,
            title: form.title.clone(),
            description: form.description.clone(),
            subject_id: form.subject_id,
            class_level: form.class_level.clone(),
            file_type: form.file_type.clone(),
            file_url: form.file_url.clone(),
            storage_key: form.storage_key.clone(),
            storage_enabled: services.storage.is_some(),
        });
    }

    let new = NewMaterial {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        subject_id: form.subject_id,
        class_level: class_level.to_string(),
        file_type,
        file_url: file_url.to_string(),
        storage_key,
        file_size: form.file_size.max(0),
        uploaded_by: viewer.user_id,
    };
    let id = material::create(&pool, &new).await?;
    log::info!("Material {id} '{}' added for class {} by user {}", new.title, new.class_level, viewer.user_id);

    Ok(flash_redirect(&session, "Material added", &format!("/materials/{id}")))
}
