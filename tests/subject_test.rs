//! Subject tests: deletion is refused while anything still references the subject.

mod common;

use classlearn::models::class_subject;
use classlearn::models::subject::{self, DeleteOutcome};
use classlearn::models::user::Role;
use common::*;

#[tokio::test]
async fn test_delete_unused_subject() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = create_subject(pool, "Art").await;

    let outcome = subject::delete_if_unused(pool, id).await.expect("Delete failed");
    assert!(matches!(outcome, DeleteOutcome::Deleted));
    assert!(subject::find_by_id(pool, id).await.expect("Query failed").is_none());

    db.teardown().await;
}

#[tokio::test]
async fn test_delete_refused_with_usage_counts() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let id = create_subject(pool, "Science").await;
    let teacher = create_user(pool, "teacher", Role::Teacher, None).await;
    create_material(pool, id, CLASS_FIVE, teacher, "cells").await;
    create_material(pool, id, CLASS_SIX, teacher, "atoms").await;
    class_subject::create(pool, CLASS_FIVE, id, teacher).await.expect("Assign failed");

    match subject::delete_if_unused(pool, id).await.expect("Delete failed") {
        DeleteOutcome::InUse(usage) => {
            assert_eq!(usage.materials, 2);
            assert_eq!(usage.class_assignments, 1);
            assert_eq!(usage.total(), 3);
            assert_eq!(usage.summary(), "1 class assignments, 2 study materials");
        }
        other => panic!("Expected refusal, got {other:?}"),
    }
    assert!(subject::find_by_id(pool, id).await.expect("Query failed").is_some());

    db.teardown().await;
}

#[tokio::test]
async fn test_delete_missing_subject() {
    let Some(db) = setup_test_db().await else { return };
    let outcome = subject::delete_if_unused(db.pool(), 9999).await.expect("Delete failed");
    assert!(matches!(outcome, DeleteOutcome::NotFound));
    db.teardown().await;
}

#[tokio::test]
async fn test_class_curriculum() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let admin = create_user(pool, "admin", Role::Admin, None).await;
    let maths = create_subject(pool, "Mathematics").await;
    let english = create_subject(pool, "English").await;
    class_subject::create(pool, CLASS_FIVE, maths, admin).await.expect("Assign failed");
    class_subject::create(pool, CLASS_SIX, english, admin).await.expect("Assign failed");
    let duplicate = class_subject::create(pool, CLASS_SIX, english, admin).await.expect("Assign failed");
    assert!(duplicate.is_none());

    let five = subject::find_for_class(pool, CLASS_FIVE).await.expect("Query failed");
    assert_eq!(five.iter().map(|s| s.id).collect::<Vec<_>>(), vec![maths]);
    assert!(class_subject::is_assigned(pool, CLASS_SIX, english).await.expect("Query failed"));
    assert!(!class_subject::is_assigned(pool, CLASS_SIX, maths).await.expect("Query failed"));

    db.teardown().await;
}
