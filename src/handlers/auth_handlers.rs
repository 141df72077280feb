use actix_session::Session;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::rate_limit::LoginRateLimiter;
use crate::auth::session::{get_user_id, take_flash};
use crate::auth::{csrf, password, session as auth_session, validate};
use crate::errors::{AppError, is_unique_violation, render};
use crate::handlers::{CsrfOnly, client_ip, see_other};
use crate::models::class_level;
use crate::models::settings::{self, NotificationKind};
use crate::models::user::{self, NewUser, PaymentStatus, RegisterForm, Role};
use crate::services::Services;
use crate::services::notify::messages;
use crate::templates_structs::{HomeTemplate, LoginTemplate, RegisterTemplate, class_options};

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: String,
}

pub async fn home(session: Session) -> Result<HttpResponse, AppError> {
    let tmpl = HomeTemplate {
        app_name: crate::config::app_name(),
        logged_in: get_user_id(&session).is_some(),
    };
    render(tmpl)
}

fn login_template(session: &Session, error: Option<String>) -> LoginTemplate {
    LoginTemplate {
        error,
        flash: take_flash(session),
        app_name: crate::config::app_name(),
        csrf_token: csrf::get_or_create_token(session),
    }
}

pub async fn login_page(session: Session) -> Result<HttpResponse, AppError> {
    if get_user_id(&session).is_some() {
        return Ok(see_other("/dashboard"));
    }
    render(login_template(&session, None))
}

pub async fn login_submit(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<LoginForm>,
    limiter: web::Data<LoginRateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    // Rate-limit check before any database access
    let ip = client_ip(&req);
    if limiter.is_blocked(ip) {
        log::warn!("Login blocked for {ip}: too many failures");
        let error = "Too many failed login attempts. Please try again later.".to_string();
        return render(login_template(&session, Some(error)));
    }

    let found = user::find_by_username(&pool, form.username.trim()).await?;
    let verified = match &found {
        Some(u) => password::verify_password(&form.password, &u.password_hash).unwrap_or(false),
        None => false,
    };

    let Some(u) = found.filter(|_| verified) else {
        limiter.record_failure(ip);
        let error = "Invalid username or password".to_string();
        return render(login_template(&session, Some(error)));
    };

    if !u.is_active {
        let error = "This account has been deactivated. Contact an administrator.".to_string();
        return render(login_template(&session, Some(error)));
    }

    limiter.clear(ip);
    auth_session::start(&session, &u)?;
    user::touch_last_login(&pool, u.id).await?;
    log::info!("User '{}' logged in from {ip}", u.username);

    if !settings::opted_in(&pool, &[u.id], NotificationKind::Login).await?.is_empty() {
        let mail = messages::login_notice(services.app_name(), &u, &ip.to_string(), Utc::now());
        services.notifier.send_in_background(mail);
    }

    Ok(see_other("/dashboard"))
}

pub async fn logout(session: Session, form: web::Form<CsrfOnly>) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    Ok(see_other("/login"))
}

fn register_template(
    session: &Session,
    services: &Services,
    form: Option<&RegisterForm>,
    errors: Vec<String>,
) -> RegisterTemplate {
    RegisterTemplate {
        app_name: services.app_name().to_string(),
        csrf_token: csrf::get_or_create_token(session),
        errors,
        classes: class_options(),
        username: form.map(|f| f.username.clone()).unwrap_or_default(),
        email: form.map(|f| f.email.clone()).unwrap_or_default(),
        display_name: form.map(|f| f.display_name.clone()).unwrap_or_default(),
        role: form.map(|f| f.role.clone()).unwrap_or_else(|| "student".to_string()),
        class_level: form.map(|f| f.class_level.clone()).unwrap_or_default(),
        payments_enabled: services.stripe.is_some(),
    }
}

pub async fn register_page(
    session: Session,
    services: web::Data<Services>,
) -> Result<HttpResponse, AppError> {
    if get_user_id(&session).is_some() {
        return Ok(see_other("/dashboard"));
    }
    render(register_template(&session, &services, None, vec![]))
}

/// Open registration for students and teachers. Students owe the
/// registration fee when payments are configured.
pub async fn register_submit(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<RegisterForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_username(&form.username));
    errors.extend(validate::validate_email(&form.email));
    errors.extend(validate::validate_optional(&form.display_name, "Display name", 100));
    errors.extend(validate::validate_password(&form.password, &form.password_confirm));

    let role = match Role::parse(&form.role) {
        Some(Role::Admin) | None => {
            errors.push("Choose either student or teacher".to_string());
            Role::Student
        }
        Some(r) => r,
    };

    let class_level = match class_level::parse_optional(&form.class_level) {
        Ok(level) => level,
        Err(e) => {
            errors.push(e);
            None
        }
    };
    if role == Role::Student && class_level.is_none() && errors.is_empty() {
        errors.push("Students must choose a class level".to_string());
    }

    if errors.is_empty() && user::username_exists(&pool, form.username.trim()).await? {
        errors.push("Username is already taken".to_string());
    }

    if !errors.is_empty() {
        return render(register_template(&session, &services, Some(&form), errors));
    }

    let password_hash = password::hash_password(&form.password).map_err(AppError::Hash)?;
    let payment_status = if role == Role::Student && services.stripe.is_some() {
        PaymentStatus::Pending
    } else {
        PaymentStatus::Exempt
    };

    let new = NewUser {
        username: form.username.trim().to_string(),
        password_hash,
        email: form.email.trim().to_string(),
        display_name: form.display_name.trim().to_string(),
        role,
        class_level,
        payment_status,
    };

    let user_id = match user::create(&pool, &new).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            let errors = vec!["Username is already taken".to_string()];
            return render(register_template(&session, &services, Some(&form), errors));
        }
        Err(e) => return Err(e.into()),
    };

    let created = user::find_by_id(&pool, user_id).await?.ok_or(AppError::NotFound)?;
    log::info!("Registered {} '{}' ({})", role.as_str(), created.username, payment_status.as_str());

    let mail = messages::welcome(services.app_name(), &created, &services.config.absolute_url("/login"));
    services.notifier.send_in_background(mail);

    auth_session::start(&session, &created)?;

    if payment_status == PaymentStatus::Pending {
        return Ok(see_other(&format!("/payment/checkout/{user_id}")));
    }

    let _ = session.insert("flash", format!("Welcome to {}!", services.app_name()));
    Ok(see_other("/dashboard"))
}
