use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::auth::password;
use crate::config::AppConfig;

/// Subjects created on first start so teachers can begin assigning content.
const DEFAULT_SUBJECTS: &[(&str, &str, &str)] = &[
    ("Mathematics", "Numbers, algebra, geometry and beyond", "calculator"),
    ("Science", "Physics, chemistry and biology", "flask"),
    ("English", "Reading, writing and communication", "book"),
    ("Social Studies", "History, geography and civics", "globe"),
    ("Computer Science", "Programming and digital literacy", "laptop"),
];

pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Seed an initial admin account and the default subject list when the
/// database is empty. Safe to call on every start.
pub async fn seed(pool: &PgPool, config: &AppConfig) -> Result<(), sqlx::Error> {
    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if user_count == 0 {
        match password::hash_password(&config.admin_password) {
            Ok(hash) => {
                sqlx::query(
                    "INSERT INTO users (username, email, password_hash, display_name, role, payment_status) \
                     VALUES ($1, $2, $3, 'Administrator', 'admin', 'exempt')",
                )
                .bind(&config.admin_username)
                .bind(&config.admin_email)
                .bind(&hash)
                .execute(pool)
                .await?;
                log::info!("Seeded admin account '{}'", config.admin_username);
            }
            Err(e) => log::error!("Could not hash seed admin password: {e}"),
        }
    }

    let subject_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subjects")
        .fetch_one(pool)
        .await?;

    if subject_count == 0 {
        for (name, description, icon) in DEFAULT_SUBJECTS {
            sqlx::query("INSERT INTO subjects (name, description, icon) VALUES ($1, $2, $3)")
                .bind(name)
                .bind(description)
                .bind(icon)
                .execute(pool)
                .await?;
        }
        log::info!("Seeded {} default subjects", DEFAULT_SUBJECTS.len());
    }

    Ok(())
}
