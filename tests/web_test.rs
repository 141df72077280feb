//! HTTP-level tests that need no database: routing guards, CSRF and the JSON API gate.

use std::net::SocketAddr;
use std::time::Duration;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::http::{StatusCode, header};
use actix_web::{App, HttpResponse, middleware::from_fn, test, web};
use regex::Regex;
use sqlx::PgPool;

use classlearn::auth::middleware::json_content_type;
use classlearn::auth::rate_limit::LoginRateLimiter;
use classlearn::config::AppConfig;
use classlearn::routes;
use classlearn::services::Services;

const PEER: &str = "127.0.0.1:40000";

fn lazy_pool() -> PgPool {
    // Never connected: these routes fail before touching the database.
    PgPool::connect_lazy("postgres://localhost/classlearn_unused").expect("Invalid URL")
}

macro_rules! app {
    ($limiter:expr) => {
        test::init_service(
            App::new()
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
                        .cookie_secure(false)
                        .build(),
                )
                .app_data(web::Data::new(lazy_pool()))
                .app_data(web::Data::new(Services::offline(&AppConfig::default())))
                .app_data(web::Data::new($limiter))
                .configure(routes::configure)
                .default_service(web::to(routes::not_found)),
        )
        .await
    };
}

fn location(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn session_cookie(resp: &actix_web::dev::ServiceResponse) -> Cookie<'static> {
    resp.response().cookies().next().expect("No session cookie").into_owned()
}

fn csrf_token(body: &str) -> String {
    let re = Regex::new(r#"name="csrf_token" value="([0-9a-f]+)""#).expect("Bad regex");
    re.captures(body).expect("No CSRF token in page")[1].to_string()
}

#[actix_rt::test]
async fn test_protected_pages_redirect_to_login() {
    let app = app!(LoginRateLimiter::default());

    for path in ["/dashboard", "/quizzes", "/tutor", "/management/users", "/zoom/meetings"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&resp), "/login", "{path}");
    }

    let req = test::TestRequest::post()
        .uri("/api/quiz/submit")
        .set_json(serde_json::json!({ "attempt_id": 1 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/login");
}

#[actix_rt::test]
async fn test_public_pages_render() {
    let app = app!(LoginRateLimiter::default());

    for path in ["/", "/login", "/register", "/password-reset", "/password-reset/done", "/reset/done"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }
}

#[actix_rt::test]
async fn test_login_rejects_missing_csrf_token() {
    let app = app!(LoginRateLimiter::default());

    let page = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;
    let cookie = session_cookie(&page);

    let req = test::TestRequest::post()
        .uri("/login")
        .cookie(cookie)
        .set_form([("username", "admin"), ("password", "x"), ("csrf_token", "forged")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_password_reset_rejects_bad_email_before_lookup() {
    let app = app!(LoginRateLimiter::default());

    let page = test::call_service(&app, test::TestRequest::get().uri("/password-reset").to_request()).await;
    let cookie = session_cookie(&page);
    let body = String::from_utf8(test::read_body(page).await.to_vec()).expect("Non-UTF8 body");
    let token = csrf_token(&body);

    let req = test::TestRequest::post()
        .uri("/password-reset")
        .cookie(cookie)
        .set_form([("email", "not-an-address"), ("csrf_token", token.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).expect("Non-UTF8 body");
    assert!(body.contains("Enter a valid email address"));
}

#[actix_rt::test]
async fn test_password_reset_confirm_requires_csrf_token() {
    let app = app!(LoginRateLimiter::default());

    let page = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;
    let cookie = session_cookie(&page);

    let req = test::TestRequest::post()
        .uri("/reset/abc")
        .cookie(cookie)
        .set_form([("password", "longenough"), ("password_confirm", "longenough"), ("csrf_token", "forged")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn test_login_blocked_after_repeated_failures() {
    let limiter = LoginRateLimiter::new(1, Duration::from_secs(60));
    let peer: SocketAddr = PEER.parse().expect("Bad address");
    limiter.record_failure(peer.ip());
    let app = app!(limiter);

    let page = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;
    let cookie = session_cookie(&page);
    let body = String::from_utf8(test::read_body(page).await.to_vec()).expect("Non-UTF8 body");
    let token = csrf_token(&body);

    let req = test::TestRequest::post()
        .uri("/login")
        .peer_addr(peer)
        .cookie(cookie)
        .set_form([("username", "admin"), ("password", "x"), ("csrf_token", token.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).expect("Non-UTF8 body");
    assert!(body.contains("Too many failed login attempts"));
}

#[actix_rt::test]
async fn test_json_api_requires_json_body() {
    let app = test::init_service(
        App::new().service(
            web::scope("/api")
                .wrap(from_fn(json_content_type))
                .route("/echo", web::post().to(|| async { HttpResponse::Ok().body("{}") })),
        ),
    )
    .await;

    let form = test::TestRequest::post()
        .uri("/api/echo")
        .set_form([("a", "b")])
        .to_request();
    let resp = test::call_service(&app, form).await;
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let json = test::TestRequest::post()
        .uri("/api/echo")
        .set_json(serde_json::json!({ "a": "b" }))
        .to_request();
    let resp = test::call_service(&app, json).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
}
