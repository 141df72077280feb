pub mod assignment_handlers;
pub mod auth_handlers;
pub mod conference_handlers;
pub mod dashboard;
pub mod learning_handlers;
pub mod management_handlers;
pub mod material_handlers;
pub mod password_reset_handlers;
pub mod payment_handlers;
pub mod profile_handlers;
pub mod quiz_handlers;
pub mod recording_handlers;
pub mod subject_handlers;
pub mod tutor_handlers;

use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

/// 303 to `location`.
pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

/// Store a flash message and redirect.
pub fn flash_redirect(session: &Session, message: impl Into<String>, location: &str) -> HttpResponse {
    let _ = session.insert("flash", message.into());
    see_other(location)
}

pub fn client_ip(req: &HttpRequest) -> std::net::IpAddr {
    req.peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

/// `{"ok": false, "error": ...}` with the given status.
pub fn json_error(status: actix_web::http::StatusCode, message: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "ok": false, "error": message.to_string() }))
}

/// Subject and class checks shared by every class-scoped content form.
pub async fn check_placement(
    pool: &sqlx::PgPool,
    subject_id: i64,
    class_level: &str,
    errors: &mut Vec<String>,
) -> Result<(), sqlx::Error> {
    if !crate::models::class_level::is_valid(class_level.trim()) {
        errors.push("Choose a valid class level".to_string());
    }
    if crate::models::subject::find_by_id(pool, subject_id).await?.is_none() {
        errors.push("Choose a valid subject".to_string());
    }
    Ok(())
}
