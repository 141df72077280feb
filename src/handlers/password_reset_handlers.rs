use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::{csrf, password, validate};
use crate::config::defaults;
use crate::errors::{AppError, render};
use crate::handlers::see_other;
use crate::models::{password_reset, user};
use crate::services::Services;
use crate::services::notify::messages;
use crate::templates_structs::{
    PasswordResetConfirmTemplate, PasswordResetNoticeTemplate, PasswordResetRequestTemplate,
};

#[derive(Deserialize)]
pub struct ResetRequestForm {
    pub email: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct NewPasswordForm {
    pub password: String,
    pub password_confirm: String,
    pub csrf_token: String,
}

fn request_template(session: &Session, email: &str, errors: Vec<String>) -> PasswordResetRequestTemplate {
    PasswordResetRequestTemplate {
        app_name: crate::config::app_name(),
        csrf_token: csrf::get_or_create_token(session),
        email: email.to_string(),
        errors,
    }
}

fn notice(heading: &str, message: String) -> Result<HttpResponse, AppError> {
    render(PasswordResetNoticeTemplate {
        app_name: crate::config::app_name(),
        heading: heading.to_string(),
        message,
    })
}

pub async fn request_page(session: Session) -> Result<HttpResponse, AppError> {
    render(request_template(&session, "", vec![]))
}

/// Email a reset link to every active account on the address. The response
/// is the same whether or not any account matched.
pub async fn request_submit(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<ResetRequestForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    if let Some(error) = validate::validate_email(&form.email) {
        return render(request_template(&session, &form.email, vec![error]));
    }

    let accounts = user::find_active_by_email(&pool, form.email.trim()).await?;
    let now = Utc::now();
    for account in &accounts {
        let token = password_reset::issue(&pool, account.id, now).await?;
        let url = services.config.absolute_url(&format!("/reset/{token}"));
        let mail = messages::password_reset(
            services.app_name(),
            account,
            &url,
            defaults::PASSWORD_RESET_TTL_HOURS,
        );
        services.notifier.send_in_background(mail);
        log::info!("Password reset link issued for '{}'", account.username);
    }
    if accounts.is_empty() {
        log::info!("Password reset requested for an address with no active account");
    }

    Ok(see_other("/password-reset/done"))
}

pub async fn done_page() -> Result<HttpResponse, AppError> {
    notice(
        "Check your email",
        format!(
            "If an active account uses that address, a reset link is on its way. The link works once and expires after {} hours.",
            defaults::PASSWORD_RESET_TTL_HOURS
        ),
    )
}

pub async fn confirm_page(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let token = path.into_inner();
    let valid = password_reset::find_valid(&pool, &token, Utc::now()).await?.is_some();
    render(PasswordResetConfirmTemplate {
        app_name: crate::config::app_name(),
        csrf_token: csrf::get_or_create_token(&session),
        token,
        valid,
        errors: vec![],
    })
}

pub async fn confirm_submit(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<NewPasswordForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let token = path.into_inner();

    if let Some(error) = validate::validate_password(&form.password, &form.password_confirm) {
        let valid = password_reset::find_valid(&pool, &token, Utc::now()).await?.is_some();
        return render(PasswordResetConfirmTemplate {
            app_name: crate::config::app_name(),
            csrf_token: csrf::get_or_create_token(&session),
            token,
            valid,
            errors: vec![error],
        });
    }

    let password_hash = password::hash_password(&form.password).map_err(AppError::Hash)?;
    match password_reset::redeem(&pool, &token, &password_hash, Utc::now()).await? {
        Some(user_id) => {
            log::info!("Password reset completed for user {user_id}");
            Ok(see_other("/reset/done"))
        }
        None => render(PasswordResetConfirmTemplate {
            app_name: crate::config::app_name(),
            csrf_token: csrf::get_or_create_token(&session),
            token,
            valid: false,
            errors: vec![],
        }),
    }
}

pub async fn complete_page() -> Result<HttpResponse, AppError> {
    notice("Password changed", "Your password has been updated. You can log in with it now.".to_string())
}
