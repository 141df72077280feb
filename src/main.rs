use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};

use classlearn::auth::rate_limit::LoginRateLimiter;
use classlearn::config::AppConfig;
use classlearn::services::Services;
use classlearn::{db, routes};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();
    let Some(database_url) = config.database_url.clone() else {
        log::error!("DATABASE_URL is not set");
        return Err(std::io::Error::other("DATABASE_URL is not set"));
    };

    let pool = db::init_pool(&database_url).await.map_err(std::io::Error::other)?;
    db::run_migrations(&pool).await.map_err(std::io::Error::other)?;
    db::seed(&pool, &config).await.map_err(std::io::Error::other)?;

    let services = web::Data::new(Services::from_config(&config, &pool).await);
    let limiter = web::Data::new(LoginRateLimiter::default());

    // Persistent sessions across restarts need SESSION_KEY
    let secret_key = match &config.session_key {
        Some(val) if val.len() >= 64 => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        Some(val) => {
            log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
            Key::generate()
        }
        None => {
            log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
            Key::generate()
        }
    };
    let secure_cookies = config.public_url.starts_with("https://");

    log::info!("Starting {} at http://{}", config.app_name, config.bind_addr);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
            .cookie_secure(secure_cookies)
            .cookie_http_only(true)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(services.clone())
            .app_data(limiter.clone())
            .service(actix_files::Files::new("/static", "./static"))
            .configure(routes::configure)
            .default_service(web::to(routes::not_found))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
