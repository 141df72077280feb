//! Emailed password reset tokens: single use, time limited, and bound to an
//! active account.

mod common;

use chrono::{Duration, Utc};

use classlearn::auth::password;
use classlearn::models::password_reset;
use classlearn::models::user::{self, Role};
use common::*;

const NEW_PASSWORD: &str = "fresh-password-42";

#[tokio::test]
async fn test_reset_token_changes_password_once() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = create_user(pool, "forgetful", Role::Student, Some(CLASS_FIVE)).await;

    let token = password_reset::issue(pool, id, Utc::now()).await.expect("Issue failed");
    assert_eq!(password_reset::find_valid(pool, &token, Utc::now()).await.expect("Query failed"), Some(id));

    let hash = password::hash_password(NEW_PASSWORD).expect("Failed to hash password");
    let redeemed = password_reset::redeem(pool, &token, &hash, Utc::now()).await.expect("Redeem failed");
    assert_eq!(redeemed, Some(id));

    let stored = user::find_by_id(pool, id).await.expect("Query failed").expect("User missing");
    assert!(password::verify_password(NEW_PASSWORD, &stored.password_hash).expect("Verify failed"));
    assert!(!password::verify_password(TEST_PASSWORD, &stored.password_hash).expect("Verify failed"));

    let again = password_reset::redeem(pool, &token, &hash, Utc::now()).await.expect("Redeem failed");
    assert_eq!(again, None);
    assert_eq!(password_reset::find_valid(pool, &token, Utc::now()).await.expect("Query failed"), None);

    db.teardown().await;
}

#[tokio::test]
async fn test_expired_token_is_refused() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = create_user(pool, "late", Role::Teacher, None).await;

    let issued = Utc::now() - Duration::days(4);
    let token = password_reset::issue(pool, id, issued).await.expect("Issue failed");
    assert_eq!(password_reset::find_valid(pool, &token, Utc::now()).await.expect("Query failed"), None);

    let hash = password::hash_password(NEW_PASSWORD).expect("Failed to hash password");
    assert_eq!(password_reset::redeem(pool, &token, &hash, Utc::now()).await.expect("Redeem failed"), None);

    let stored = user::find_by_id(pool, id).await.expect("Query failed").expect("User missing");
    assert!(password::verify_password(TEST_PASSWORD, &stored.password_hash).expect("Verify failed"));

    db.teardown().await;
}

#[tokio::test]
async fn test_redeeming_one_link_voids_the_others() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = create_user(pool, "twice", Role::Student, Some(CLASS_SIX)).await;

    let first = password_reset::issue(pool, id, Utc::now()).await.expect("Issue failed");
    let second = password_reset::issue(pool, id, Utc::now()).await.expect("Issue failed");
    assert_ne!(first, second);

    let hash = password::hash_password(NEW_PASSWORD).expect("Failed to hash password");
    assert_eq!(password_reset::redeem(pool, &second, &hash, Utc::now()).await.expect("Redeem failed"), Some(id));
    assert_eq!(password_reset::find_valid(pool, &first, Utc::now()).await.expect("Query failed"), None);

    db.teardown().await;
}

#[tokio::test]
async fn test_deactivated_account_cannot_reset() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = create_user(pool, "suspended", Role::Student, Some(CLASS_FIVE)).await;
    let token = password_reset::issue(pool, id, Utc::now()).await.expect("Issue failed");
    user::toggle_active(pool, id).await.expect("Toggle failed");

    assert_eq!(password_reset::find_valid(pool, &token, Utc::now()).await.expect("Query failed"), None);
    let hash = password::hash_password(NEW_PASSWORD).expect("Failed to hash password");
    assert_eq!(password_reset::redeem(pool, &token, &hash, Utc::now()).await.expect("Redeem failed"), None);
    assert!(user::find_active_by_email(pool, "suspended@example.com").await.expect("Query failed").is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn test_reset_lookup_matches_email_case_insensitively() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = create_user(pool, "mixed", Role::Teacher, None).await;

    let found = user::find_active_by_email(pool, "MIXED@Example.com").await.expect("Query failed");
    assert_eq!(found.iter().map(|u| u.id).collect::<Vec<_>>(), vec![id]);
    assert!(user::find_active_by_email(pool, "nobody@example.com").await.expect("Query failed").is_empty());

    db.teardown().await;
}
