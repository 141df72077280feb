//! Conference model tests: who may be invited, how a Zoom class keeps a
//! usable link when the provider meeting is missing, and how account
//! meetings map back to classes.

mod common;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use classlearn::auth::policy;
use classlearn::models::conference::{self, NewConference, RemoteMeeting};
use classlearn::models::user::{self, Role};
use common::*;

async fn zoom_class(pool: &PgPool, link: &str) -> (i64, NewConference) {
    let subject_id = create_subject(pool, "Science").await;
    let host = create_user(pool, "host", Role::Teacher, Some(CLASS_FIVE)).await;
    let start = Utc::now() + Duration::days(2);
    let new = NewConference {
        title: "Plants".to_string(),
        description: String::new(),
        subject_id,
        class_level: CLASS_FIVE.to_string(),
        platform: "zoom".to_string(),
        meeting_link: link.to_string(),
        meeting_password: String::new(),
        scheduled_by: host,
        start_time: start,
        end_time: start + Duration::hours(1),
        auto_record: false,
    };
    let id = conference::create(pool, &new).await.expect("Failed to create conference");
    (id, new)
}

#[tokio::test]
async fn test_invitees_limited_to_active_class_students() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();

    let five_a = create_user(pool, "five_a", Role::Student, Some(CLASS_FIVE)).await;
    let five_b = create_user(pool, "five_b", Role::Student, Some(CLASS_FIVE)).await;
    let six = create_user(pool, "six", Role::Student, Some(CLASS_SIX)).await;
    let gone = create_user(pool, "gone", Role::Student, Some(CLASS_FIVE)).await;
    let teacher = create_user(pool, "teacher", Role::Teacher, Some(CLASS_FIVE)).await;
    user::toggle_active(pool, gone).await.expect("Toggle failed");

    let requested = vec![five_a, six, gone, teacher, 999_999];
    let checked = conference::resolve_invitees(pool, CLASS_FIVE, &requested).await.expect("Query failed");
    assert_eq!(checked.accepted, vec![five_a]);
    assert_eq!(checked.rejected, vec![six, gone, teacher, 999_999]);

    let whole_class = conference::resolve_invitees(pool, CLASS_FIVE, &[]).await.expect("Query failed");
    assert_eq!(whole_class.accepted, vec![five_a, five_b]);
    assert!(whole_class.rejected.is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn test_accepted_invitees_can_open_the_class() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();

    let (id, _) = zoom_class(pool, "").await;
    let student = create_user(pool, "student", Role::Student, Some(CLASS_FIVE)).await;
    let checked = conference::resolve_invitees(pool, CLASS_FIVE, &[]).await.expect("Query failed");
    conference::add_participants(pool, id, &checked.accepted, "student").await.expect("Insert failed");

    let conf = conference::find_by_id(pool, id).await.expect("Query failed").expect("Conference missing");
    let participants = conference::participants(pool, id).await.expect("Query failed");
    assert_eq!(participants.len(), 1);
    for p in participants {
        let who = viewer(p.user_id, Role::Student, Some(CLASS_FIVE));
        assert_eq!(p.user_id, student);
        assert!(policy::can_view(&who, &conf));
    }

    db.teardown().await;
}

#[tokio::test]
async fn test_manual_link_editable_until_zoom_meeting_exists() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();

    let (id, mut new) = zoom_class(pool, "https://meet.example.com/fallback").await;
    let stored = conference::find_by_id(pool, id).await.expect("Query failed").expect("Conference missing");
    assert_eq!(stored.meeting_link, "https://meet.example.com/fallback");

    new.meeting_link = "https://meet.example.com/other".to_string();
    conference::update_details(pool, id, &new).await.expect("Update failed");
    let stored = conference::find_by_id(pool, id).await.expect("Query failed").expect("Conference missing");
    assert_eq!(stored.meeting_link, "https://meet.example.com/other");

    let remote = RemoteMeeting {
        meeting_id: "81234567890".to_string(),
        join_url: "https://zoom.example.com/j/81234567890".to_string(),
        start_url: "https://zoom.example.com/s/81234567890".to_string(),
        password: "abc123".to_string(),
        used_oauth: false,
    };
    conference::set_remote(pool, id, &remote).await.expect("Update failed");

    new.meeting_link = "https://meet.example.com/ignored".to_string();
    conference::update_details(pool, id, &new).await.expect("Update failed");
    let stored = conference::find_by_id(pool, id).await.expect("Query failed").expect("Conference missing");
    assert_eq!(stored.meeting_link, remote.join_url);
    assert_eq!(stored.meeting_password, "abc123");

    db.teardown().await;
}

#[tokio::test]
async fn test_account_meetings_link_to_their_class() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();

    let (id, _) = zoom_class(pool, "").await;
    let remote = RemoteMeeting {
        meeting_id: "81234567890".to_string(),
        join_url: "https://zoom.example.com/j/81234567890".to_string(),
        start_url: String::new(),
        password: String::new(),
        used_oauth: true,
    };
    conference::set_remote(pool, id, &remote).await.expect("Update failed");

    let listed = vec!["85550001111".to_string(), "81234567890".to_string(), String::new()];
    let linked = conference::find_by_meeting_ids(pool, &listed).await.expect("Query failed");
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].id, id);
    assert_eq!(linked[0].meeting_id, "81234567890");

    let none = conference::find_by_meeting_ids(pool, &["85550001111".to_string()]).await.expect("Query failed");
    assert!(none.is_empty());

    db.teardown().await;
}
