use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::policy::{Viewer, require_admin};
use crate::auth::session::current_viewer;
use crate::errors::{AppError, render};
use crate::handlers::{CsrfOnly, flash_redirect};
use crate::models::class_level;
use crate::models::user::{self, ManageUserForm, Role, User};
use crate::templates_structs::{PageContext, UserEditTemplate, UserListTemplate, class_options};

const LIST_PATH: &str = "/management/users";

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    #[serde(default)]
    pub role: Option<String>,
}

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;

    // Unknown role names fall back to the full list.
    let role_filter = query.role.as_deref().and_then(Role::parse);
    let users = user::find_all(&pool, role_filter.map(|r| r.as_str())).await?;
    let (student_count, teacher_count, admin_count) = user::count_by_role(&pool).await?;

    let ctx = PageContext::build(&session, &pool, &viewer, LIST_PATH).await?;
    render(UserListTemplate {
        ctx,
        users,
        role_filter: role_filter.map(|r| r.as_str().to_string()).unwrap_or_default(),
        student_count,
        teacher_count,
        admin_count,
    })
}

async fn edit_page(
    session: &Session,
    pool: &PgPool,
    viewer: &Viewer,
    target: User,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let ctx = PageContext::build(session, pool, viewer, LIST_PATH).await?;
    render(UserEditTemplate { ctx, user: target, classes: class_options(), errors })
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let target = user::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    edit_page(&session, &pool, &viewer, target, vec![]).await
}

/// Role and class level changes. Students always need a class.
pub async fn update(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<ManageUserForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let target = user::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;

    let mut errors: Vec<String> = vec![];
    let role = Role::parse(form.role.trim());
    if role.is_none() {
        errors.push("Choose a valid role".to_string());
    }
    let level = match class_level::parse_optional(&form.class_level) {
        Ok(level) => level,
        Err(e) => {
            errors.push(e);
            None
        }
    };
    if role == Some(Role::Student) && level.is_none() && errors.is_empty() {
        errors.push("Students must have a class level".to_string());
    }
    if target.id == viewer.user_id && role.is_some_and(|r| r != Role::Admin) {
        errors.push("You cannot remove your own admin role".to_string());
    }

    let Some(role) = role.filter(|_| errors.is_empty()) else {
        return edit_page(&session, &pool, &viewer, target, errors).await;
    };

    user::update_role(&pool, target.id, role, level.as_deref()).await?;
    log::info!(
        "User {} set role {} / class {:?} on user {}",
        viewer.user_id, role.as_str(), level, target.id
    );
    Ok(flash_redirect(&session, format!("Updated {}", target.username), LIST_PATH))
}

/// Deactivated accounts are refused at login and dropped at their next request.
pub async fn toggle_active(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_admin(&viewer)?;
    let id = path.into_inner();

    if id == viewer.user_id {
        return Ok(flash_redirect(&session, "You cannot deactivate your own account", LIST_PATH));
    }

    let active = user::toggle_active(&pool, id).await?.ok_or(AppError::NotFound)?;
    log::info!("User {} set is_active={active} on user {id}", viewer.user_id);
    let message = if active { "Account activated" } else { "Account deactivated" };
    Ok(flash_redirect(&session, message, LIST_PATH))
}
