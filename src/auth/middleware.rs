use actix_session::SessionExt;
use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web,
};
use sqlx::PgPool;

use crate::models::user::{self, PaymentStatus, Role};

/// Paths a student with an unpaid registration can still reach.
const PAYMENT_EXEMPT_PREFIXES: &[&str] = &["/payment/", "/logout", "/profile"];

/// Redirects to /login if no session is found.
pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let session = req.get_session();
    let has_user = session.get::<i64>("user_id").unwrap_or(None).is_some();

    if !has_user {
        let response = HttpResponse::SeeOther()
            .insert_header(("Location", "/login"))
            .finish();
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// Sends students whose registration fee is outstanding to checkout.
/// Runs inside the authenticated scope, after `require_auth`.
pub async fn require_paid(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let path = req.path().to_string();
    if PAYMENT_EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return next.call(req).await.map(|res| res.map_into_left_body());
    }

    let user_id = req.get_session().get::<i64>("user_id").unwrap_or(None);
    let pool = req.app_data::<web::Data<PgPool>>().cloned();

    if let (Some(user_id), Some(pool)) = (user_id, pool) {
        match user::find_by_id(&pool, user_id).await {
            Ok(Some(u)) if u.role() == Role::Student && !u.payment().is_settled() => {
                let target = if u.payment() == PaymentStatus::Failed {
                    format!("/payment/checkout/{}?retry=1", u.id)
                } else {
                    format!("/payment/checkout/{}", u.id)
                };
                let response = HttpResponse::SeeOther()
                    .insert_header(("Location", target))
                    .finish();
                return Ok(req.into_response(response).map_into_right_body());
            }
            Ok(_) => {}
            Err(e) => log::error!("Payment gate lookup failed for user {user_id}: {e}"),
        }
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// JSON API guard. State-changing calls must declare a JSON body, which a
/// cross-site form cannot do; responses default to JSON.
pub async fn json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    use actix_web::http::{Method, header};

    if req.method() == Method::POST {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));
        if !is_json {
            let response = HttpResponse::UnsupportedMediaType()
                .json(serde_json::json!({ "ok": false, "error": "Expected an application/json body" }));
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    let mut res = next.call(req).await?;
    if !res.headers().contains_key(header::CONTENT_TYPE) {
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
    }
    Ok(res.map_into_left_body())
}
