use actix_session::Session;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::session::{current_viewer, get_user_id};
use crate::config::defaults;
use crate::errors::{AppError, render};
use crate::handlers::flash_redirect;
use crate::models::user::{self, PaymentStatus};
use crate::services::Services;
use crate::services::notify::messages;
use crate::services::payment::CheckoutSession;
use crate::templates_structs::{CheckoutTemplate, PaymentResultTemplate};

#[derive(Debug, Deserialize)]
pub struct CheckoutQuery {
    #[serde(default)]
    pub retry: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

fn fee_label() -> String {
    format!(
        "{:.2} {}",
        defaults::REGISTRATION_FEE as f64 / 100.0,
        defaults::REGISTRATION_CURRENCY.to_uppercase()
    )
}

/// Opens a provider checkout for the user's registration fee. Only the
/// account itself or an admin may start it.
pub async fn checkout(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    query: web::Query<CheckoutQuery>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let user_id = path.into_inner();
    if viewer.user_id != user_id && !viewer.is_admin() {
        return Err(AppError::PermissionDenied(format!(
            "user {} may not pay for user {user_id}",
            viewer.user_id
        )));
    }

    let target = user::find_by_id(&pool, user_id).await?.ok_or(AppError::NotFound)?;
    if target.payment().is_settled() {
        return Ok(flash_redirect(&session, "Payment is not required for this account.", "/dashboard"));
    }

    let mut page = CheckoutTemplate {
        app_name: services.app_name().to_string(),
        csrf_token: csrf::get_or_create_token(&session),
        display_name: target.name().to_string(),
        amount: fee_label(),
        retry: query.retry.is_some() || target.payment() == PaymentStatus::Failed,
        error: None,
        checkout_url: None,
    };

    let Some(stripe) = &services.stripe else {
        page.error = Some("Payments are not available right now. Please contact an administrator.".to_string());
        return render(page);
    };

    let success_url = services.config.absolute_url("/payment/success");
    let cancel_url = services.config.absolute_url("/payment/cancel");
    match stripe.create_checkout_session(target.id, &target.email, &success_url, &cancel_url).await {
        Ok(created) => {
            log::info!("Checkout session {} created for user {}", created.id, target.id);
            page.checkout_url = created.url;
            if page.checkout_url.is_none() {
                page.error = Some("The payment provider did not return a checkout page.".to_string());
            }
        }
        Err(e) => {
            log::error!("Checkout for user {} failed: {e}", target.id);
            page.error = Some("Failed to create a payment session. Please try again later.".to_string());
        }
    }
    render(page)
}

/// Marks the registering user paid and mails a receipt. Returns false when
/// the payment was already recorded; the guarded update makes the webhook
/// and the success redirect race safely, so only one of them sends mail.
pub async fn settle(pool: &PgPool, services: &Services, paid: &CheckoutSession) -> Result<bool, AppError> {
    let user_id = paid
        .user_id()
        .ok_or_else(|| AppError::Validation("Checkout session carries no user".to_string()))?;
    let Some(target) = user::find_by_id(pool, user_id).await? else {
        log::error!("Checkout {} references unknown user {user_id}", paid.id);
        return Err(AppError::NotFound);
    };

    let amount = paid.amount_total.unwrap_or(defaults::REGISTRATION_FEE);
    let reference = paid.payment_reference();
    if !user::mark_paid(pool, target.id, amount, reference, Utc::now()).await? {
        return Ok(false);
    }
    log::info!("Registration payment {reference} recorded for user {}", target.id);

    if !target.email.is_empty() {
        let currency = paid.currency.as_deref().unwrap_or(defaults::REGISTRATION_CURRENCY);
        let mail = messages::payment_receipt(services.app_name(), &target, amount, currency, reference);
        services.notifier.send_in_background(mail);
    }
    Ok(true)
}

fn result_page(services: &Services, success: bool, message: impl Into<String>) -> Result<HttpResponse, AppError> {
    render(PaymentResultTemplate {
        app_name: services.app_name().to_string(),
        success,
        message: message.into(),
    })
}

/// Return leg of the checkout. The session is re-read from the provider;
/// the query string alone proves nothing.
pub async fn success(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    query: web::Query<SuccessQuery>,
) -> Result<HttpResponse, AppError> {
    let Some(session_id) = query.session_id.as_deref().filter(|s| !s.is_empty()) else {
        return result_page(&services, false, "Payment verification failed. Missing session information.");
    };
    let Some(stripe) = &services.stripe else {
        return result_page(&services, false, "Payments are not configured.");
    };

    let paid = match stripe.retrieve_checkout_session(session_id).await {
        Ok(s) if s.is_paid() => s,
        Ok(s) => {
            log::warn!("Checkout {} returned with status {:?}", s.id, s.payment_status);
            return result_page(&services, false, "Payment verification failed. Please contact support.");
        }
        Err(e) => {
            log::error!("Could not verify checkout {session_id}: {e}");
            return result_page(&services, false, "Payment verification failed. Please contact support.");
        }
    };

    match settle(&pool, &services, &paid).await {
        Ok(_) => result_page(&services, true, "Your payment was successful. Your account is now fully active!"),
        Err(AppError::Db(e)) => Err(AppError::Db(e)),
        Err(e) => {
            log::error!("Checkout {} could not be applied: {e}", paid.id);
            result_page(&services, false, "We could not match this payment to an account. Please contact support.")
        }
    }
}

/// The logged-in student's pending registration is flagged failed so the
/// next visit offers a retry.
pub async fn cancel(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    if let Some(user_id) = get_user_id(&session) {
        if let Some(u) = user::find_by_id(&pool, user_id).await? {
            if u.payment() == PaymentStatus::Pending {
                user::set_payment_status(&pool, u.id, PaymentStatus::Failed).await?;
                log::info!("User {} cancelled the registration checkout", u.id);
            }
        }
    }
    result_page(
        &services,
        false,
        "Your payment was canceled. Please try again or contact support for assistance.",
    )
}

/// Provider callback. Only `checkout.session.completed` changes anything.
pub async fn webhook(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let Some(stripe) = &services.stripe else {
        return Ok(HttpResponse::ServiceUnavailable().finish());
    };
    let Some(signature) = req.headers().get("Stripe-Signature").and_then(|v| v.to_str().ok()) else {
        return Ok(HttpResponse::BadRequest().finish());
    };
    let Ok(payload) = std::str::from_utf8(&body) else {
        return Ok(HttpResponse::BadRequest().finish());
    };

    let event = match stripe.verify_webhook(payload, signature) {
        Ok(event) => event,
        Err(e) => {
            log::warn!("Rejected payment webhook: {e}");
            return Ok(HttpResponse::BadRequest().finish());
        }
    };

    if let Some(completed) = event.completed_checkout() {
        match settle(&pool, &services, &completed).await {
            Ok(true) => log::info!("Payment completed via webhook {}", event.id),
            Ok(false) => {}
            Err(AppError::Db(e)) => return Err(AppError::Db(e)),
            Err(e) => log::error!("Webhook {} could not be applied: {e}", event.id),
        }
    }
    Ok(HttpResponse::Ok().finish())
}
