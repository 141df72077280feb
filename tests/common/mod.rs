//! Shared test infrastructure for model and handler tests.
//!
//! Database tests run against PostgreSQL. Point `TEST_DATABASE_URL` (or
//! `DATABASE_URL`) at a server the tests may create databases on; each test
//! gets a fresh database with all migrations applied. Without either
//! variable the database tests return early and pass.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, PgPool};

use classlearn::auth::password;
use classlearn::auth::policy::Viewer;
use classlearn::db;
use classlearn::models::user::{self, NewUser, PaymentStatus, Role};
use classlearn::models::{material, subject};

// ============================================================================
// TEST CONSTANTS
// ============================================================================

pub const TEST_PASSWORD: &str = "password123";
pub const CLASS_FIVE: &str = "5";
pub const CLASS_SIX: &str = "6";

// ============================================================================
// DATABASE SETUP
// ============================================================================

pub struct TestDb {
    pool: PgPool,
    admin: PgPool,
    name: String,
}

impl TestDb {
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Drop the per-test database. Leftovers from panicking tests are harmless.
    pub async fn teardown(self) {
        self.pool.close().await;
        let _ = self
            .admin
            .execute(format!("DROP DATABASE IF EXISTS \"{}\"", self.name).as_str())
            .await;
    }
}

fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|url| !url.is_empty())
}

/// Create a migrated, empty database. Returns `None` when no server is configured.
pub async fn setup_test_db() -> Option<TestDb> {
    let Some(url) = database_url() else {
        eprintln!("TEST_DATABASE_URL not set; skipping database test");
        return None;
    };

    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .expect("Failed to connect to test server");

    let name = format!("classlearn_test_{}", hex::encode(rand::random::<[u8; 6]>()));
    admin
        .execute(format!("CREATE DATABASE \"{name}\"").as_str())
        .await
        .expect("Failed to create test database");

    let options: PgConnectOptions = url.parse().expect("Invalid database URL");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_with(options.database(&name))
        .await
        .expect("Failed to connect to test database");

    db::run_migrations(&pool).await.expect("Failed to run migrations");

    Some(TestDb { pool, admin, name })
}

// ============================================================================
// FIXTURES
// ============================================================================

pub async fn create_user(pool: &PgPool, username: &str, role: Role, class_level: Option<&str>) -> i64 {
    let hash = password::hash_password(TEST_PASSWORD).expect("Failed to hash password");
    let payment_status = match role {
        Role::Student => PaymentStatus::Paid,
        _ => PaymentStatus::Exempt,
    };
    user::create(
        pool,
        &NewUser {
            username: username.to_string(),
            password_hash: hash,
            email: format!("{username}@example.com"),
            display_name: username.to_string(),
            role,
            class_level: class_level.map(str::to_string),
            payment_status,
        },
    )
    .await
    .expect("Failed to create user")
}

pub fn viewer(user_id: i64, role: Role, class_level: Option<&str>) -> Viewer {
    Viewer {
        user_id,
        username: format!("user{user_id}"),
        display_name: format!("User {user_id}"),
        email: format!("user{user_id}@example.com"),
        role,
        class_level: class_level.map(str::to_string),
    }
}

pub async fn create_subject(pool: &PgPool, name: &str) -> i64 {
    subject::create(pool, name, "", "book").await.expect("Failed to create subject")
}

pub async fn create_material(pool: &PgPool, subject_id: i64, class_level: &str, owner: i64, title: &str) -> i64 {
    material::create(
        pool,
        &material::NewMaterial {
            title: title.to_string(),
            description: String::new(),
            subject_id,
            class_level: class_level.to_string(),
            file_type: "pdf".to_string(),
            file_url: format!("https://files.example.com/{title}.pdf"),
            storage_key: None,
            file_size: 0,
            uploaded_by: owner,
        },
    )
    .await
    .expect("Failed to create material")
}

pub fn minutes_ago(n: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(n)
}
