//! Registration payment settlement: a checkout is recorded once no matter
//! how many confirmations arrive.

mod common;

use classlearn::config::AppConfig;
use classlearn::handlers::payment_handlers::settle;
use classlearn::models::user::{self, PaymentStatus, Role};
use classlearn::services::Services;
use classlearn::services::payment::CheckoutSession;
use common::*;

fn paid_checkout(user_id: i64) -> CheckoutSession {
    serde_json::from_value(serde_json::json!({
        "id": "cs_test_1",
        "payment_status": "paid",
        "amount_total": 100000,
        "currency": "inr",
        "payment_intent": "pi_test_1",
        "metadata": { "user_id": user_id.to_string() },
    }))
    .expect("Invalid checkout session")
}

async fn pending_student(pool: &sqlx::PgPool) -> i64 {
    let id = create_user(pool, "newcomer", Role::Student, Some(CLASS_FIVE)).await;
    user::set_payment_status(pool, id, PaymentStatus::Pending)
        .await
        .expect("Failed to reset payment");
    id
}

#[actix_rt::test]
async fn test_mark_paid_writes_once() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = pending_student(pool).await;

    let first = user::mark_paid(pool, id, 100000, "pi_first", minutes_ago(1)).await.expect("Update failed");
    let second = user::mark_paid(pool, id, 100000, "pi_second", minutes_ago(0)).await.expect("Update failed");
    assert!(first);
    assert!(!second);

    let stored = user::find_by_id(pool, id).await.expect("Query failed").expect("User missing");
    assert_eq!(stored.payment_id.as_deref(), Some("pi_first"));

    db.teardown().await;
}

#[actix_rt::test]
async fn test_settle_is_idempotent() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let services = Services::offline(&AppConfig::default());
    let id = pending_student(pool).await;
    let checkout = paid_checkout(id);

    assert!(settle(pool, &services, &checkout).await.expect("Settle failed"));
    assert!(!settle(pool, &services, &checkout).await.expect("Settle failed"));

    let stored = user::find_by_id(pool, id).await.expect("Query failed").expect("User missing");
    assert_eq!(stored.payment(), PaymentStatus::Paid);
    assert_eq!(stored.payment_amount, Some(100000));
    assert_eq!(stored.payment_id.as_deref(), Some("pi_test_1"));

    db.teardown().await;
}

#[actix_rt::test]
async fn test_concurrent_confirmations_settle_once() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let services = Services::offline(&AppConfig::default());
    let id = pending_student(pool).await;
    let checkout = paid_checkout(id);

    let (webhook, redirect) = tokio::join!(
        settle(pool, &services, &checkout),
        settle(pool, &services, &checkout),
    );
    let written = [webhook.expect("Settle failed"), redirect.expect("Settle failed")];
    assert_eq!(written.iter().filter(|w| **w).count(), 1);

    db.teardown().await;
}

#[actix_rt::test]
async fn test_settle_rejects_checkout_without_user() {
    let Some(db) = setup_test_db().await else { return };
    let services = Services::offline(&AppConfig::default());
    let mut checkout = paid_checkout(0);
    checkout.metadata.clear();

    assert!(settle(db.pool(), &services, &checkout).await.is_err());

    db.teardown().await;
}
