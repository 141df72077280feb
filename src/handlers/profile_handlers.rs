use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::session::current_viewer;
use crate::auth::{csrf, validate};
use crate::errors::{AppError, render};
use crate::handlers::{flash_redirect, see_other};
use crate::models::settings::{self, FONT_SIZES, LEARNING_STYLES, RESPONSE_LENGTHS, SettingsForm};
use crate::models::class_level;
use crate::models::user::{self, ProfileForm};
use crate::templates_structs::{
    PageContext, ProfileEditTemplate, ProfileTemplate, ProfileView, SettingsTemplate, class_options,
};

/// Own profile, or anyone's for teachers and admins.
pub async fn view(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let username = path.into_inner();

    let target = user::find_by_username(&pool, &username).await?.ok_or(AppError::NotFound)?;
    let is_self = target.id == viewer.user_id;
    if !is_self && !viewer.is_staff() {
        return Err(AppError::PermissionDenied(format!(
            "user {} may not view profile '{username}'",
            viewer.user_id
        )));
    }

    let ctx = PageContext::build(&session, &pool, &viewer, "/profile").await?;
    let tmpl = ProfileTemplate { ctx, profile: ProfileView::from(&target), is_self };
    render(tmpl)
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let me = user::find_by_id(&pool, viewer.user_id).await?.ok_or(AppError::NotFound)?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/profile").await?;

    let tmpl = ProfileEditTemplate {
        ctx,
        errors: vec![],
        display_name: me.display_name.clone(),
        email: me.email.clone(),
        bio: me.bio.clone(),
        phone_number: me.phone_number.clone(),
        class_level: me.class_level.clone().unwrap_or_default(),
        classes: class_options(),
        can_change_class: viewer.is_staff(),
    };
    render(tmpl)
}

pub async fn edit_submit(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;

    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_optional(&form.display_name, "Display name", 100));
    errors.extend(validate::validate_email(&form.email));
    errors.extend(validate::validate_optional(&form.bio, "Bio", 1000));
    errors.extend(validate::validate_phone(&form.phone_number));

    // Students keep their assigned class; staff may pick their own.
    let class_level = if viewer.is_staff() {
        match class_level::parse_optional(&form.class_level) {
            Ok(level) => level,
            Err(e) => {
                errors.push(e);
                None
            }
        }
    } else {
        viewer.class_level.clone()
    };

    if !errors.is_empty() {
        let ctx = PageContext::build(&session, &pool, &viewer, "/profile").await?;
        let tmpl = ProfileEditTemplate {
            ctx,
            errors,
            display_name: form.display_name.clone(),
            email: form.email.clone(),
            bio: form.bio.clone(),
            phone_number: form.phone_number.clone(),
            class_level: form.class_level.clone(),
            classes: class_options(),
            can_change_class: viewer.is_staff(),
        };
        return render(tmpl);
    }

    user::update_profile(
        &pool,
        viewer.user_id,
        form.display_name.trim(),
        form.email.trim(),
        form.bio.trim(),
        form.phone_number.trim(),
        class_level.as_deref(),
    )
    .await?;

    Ok(flash_redirect(&session, "Profile updated", &format!("/profile/{}", viewer.username)))
}

pub async fn settings_page(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/settings").await?;
    let prefs = settings::get_or_create(&pool, viewer.user_id).await?;

    let tmpl = SettingsTemplate {
        ctx,
        settings: prefs,
        classes: class_options(),
        font_sizes: FONT_SIZES.to_vec(),
        learning_styles: LEARNING_STYLES.to_vec(),
        response_lengths: RESPONSE_LENGTHS.to_vec(),
    };
    render(tmpl)
}

pub async fn settings_save(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<SettingsForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;

    let current = settings::get_or_create(&pool, viewer.user_id).await?;
    let updated = settings::apply_form(&current, &form);
    settings::save(&pool, &updated).await?;

    let _ = session.insert("flash", "Settings saved");
    Ok(see_other("/settings"))
}
