//! Class-level access tests: every list query must agree with the per-item policy.

mod common;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use classlearn::auth::policy::{self, ClassScoped, ListScope, Viewer};
use classlearn::models::assignment::{self, NewAssignment};
use classlearn::models::conference::{self, NewConference};
use classlearn::models::material::{self, MaterialFilter};
use classlearn::models::quiz::{self, NewQuiz};
use classlearn::models::recording::{self, NewRecording, RecordingFilter, StorageType};
use classlearn::models::user::Role;
use common::*;

fn titles(items: &[material::Material]) -> Vec<String> {
    let mut t: Vec<String> = items.iter().map(|m| m.title.clone()).collect();
    t.sort();
    t
}

#[tokio::test]
async fn test_list_scope_matches_policy() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();

    let subject_id = create_subject(pool, "Science").await;
    let author = create_user(pool, "author", Role::Teacher, None).await;
    let class_six_teacher = create_user(pool, "six", Role::Teacher, Some(CLASS_SIX)).await;
    create_material(pool, subject_id, CLASS_FIVE, author, "five").await;
    create_material(pool, subject_id, CLASS_SIX, author, "six").await;
    create_material(pool, subject_id, CLASS_FIVE, class_six_teacher, "own").await;

    let viewers = [
        viewer(100, Role::Student, Some(CLASS_FIVE)),
        viewer(101, Role::Student, None),
        viewer(class_six_teacher, Role::Teacher, Some(CLASS_SIX)),
        viewer(author, Role::Teacher, None),
        viewer(102, Role::Admin, None),
    ];
    let expected: [&[&str]; 5] = [
        &["five", "own"],
        &[],
        &["own", "six"],
        &["five", "six"],
        &["five", "own", "six"],
    ];

    let everything = material::find_visible(pool, &ListScope::All, &MaterialFilter::default())
        .await
        .expect("Query failed");

    for (v, want) in viewers.iter().zip(expected) {
        let scope = ListScope::for_viewer(v);
        let listed = material::find_visible(pool, &scope, &MaterialFilter::default())
            .await
            .expect("Query failed");
        assert_eq!(titles(&listed), want, "listing for {:?}", v.role);

        let allowed: Vec<_> = everything.iter().filter(|m| policy::can_view(v, *m)).cloned().collect();
        assert_eq!(titles(&allowed), titles(&listed), "policy for {:?}", v.role);

        let count = material::count_visible(pool, &scope).await.expect("Count failed");
        assert_eq!(count, listed.len() as i64);
    }

    db.teardown().await;
}

#[tokio::test]
async fn test_filters_narrow_the_visible_set() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();

    let maths = create_subject(pool, "Mathematics").await;
    let english = create_subject(pool, "English").await;
    let author = create_user(pool, "author", Role::Teacher, None).await;
    create_material(pool, maths, CLASS_FIVE, author, "algebra").await;
    create_material(pool, english, CLASS_FIVE, author, "grammar").await;

    let scope = ListScope::ClassLevel(Some(CLASS_FIVE.to_string()));
    let by_subject = MaterialFilter { subject: Some(english), ..Default::default() };
    let listed = material::find_visible(pool, &scope, &by_subject).await.expect("Query failed");
    assert_eq!(titles(&listed), ["grammar"]);

    let by_text = MaterialFilter { q: Some("ALG".to_string()), ..Default::default() };
    let listed = material::find_visible(pool, &scope, &by_text).await.expect("Query failed");
    assert_eq!(titles(&listed), ["algebra"]);

    db.teardown().await;
}

// ============================================================================
// ONE ITEM PER CLASS FOR EVERY CLASS-SCOPED TABLE
// ============================================================================

/// Three items per table: class 5 and class 6 by `author`, plus a class 5
/// item owned by the class 6 teacher.
struct Scene {
    subject_id: i64,
    author: i64,
    six_teacher: i64,
}

impl Scene {
    async fn new(pool: &PgPool) -> Self {
        Self {
            subject_id: create_subject(pool, "Science").await,
            author: create_user(pool, "author", Role::Teacher, None).await,
            six_teacher: create_user(pool, "six", Role::Teacher, Some(CLASS_SIX)).await,
        }
    }

    fn placements(&self) -> [(&'static str, &'static str, i64); 3] {
        [
            ("five", CLASS_FIVE, self.author),
            ("six", CLASS_SIX, self.author),
            ("own", CLASS_FIVE, self.six_teacher),
        ]
    }

    fn viewers(&self) -> Vec<(Viewer, Vec<&'static str>)> {
        vec![
            (viewer(100, Role::Student, Some(CLASS_FIVE)), vec!["five", "own"]),
            (viewer(103, Role::Student, Some(CLASS_SIX)), vec!["six"]),
            (viewer(101, Role::Student, None), vec![]),
            (viewer(self.six_teacher, Role::Teacher, Some(CLASS_SIX)), vec!["own", "six"]),
            (viewer(self.author, Role::Teacher, None), vec!["five", "six"]),
            (viewer(102, Role::Admin, None), vec!["five", "own", "six"]),
        ]
    }
}

fn sorted<T>(items: &[T], title: impl Fn(&T) -> &str) -> Vec<String> {
    let mut t: Vec<String> = items.iter().map(|i| title(i).to_string()).collect();
    t.sort();
    t
}

fn assert_agrees<T: ClassScoped>(
    table: &str,
    v: &Viewer,
    want: &[&str],
    listed: &[T],
    everything: &[T],
    title: impl Fn(&T) -> &str,
) {
    let listed_titles = sorted(listed, &title);
    assert_eq!(listed_titles, want, "{table} listing for {:?} {:?}", v.role, v.class_level);

    let allowed: Vec<&T> = everything.iter().filter(|i| policy::can_view(v, *i)).collect();
    let mut allowed_titles: Vec<String> = allowed.iter().map(|i| title(*i).to_string()).collect();
    allowed_titles.sort();
    assert_eq!(allowed_titles, listed_titles, "{table} policy for {:?} {:?}", v.role, v.class_level);
}

#[tokio::test]
async fn test_conference_listing_matches_policy() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let scene = Scene::new(pool).await;

    let start = Utc::now() + Duration::days(1);
    for (title, class_level, owner) in scene.placements() {
        conference::create(
            pool,
            &NewConference {
                title: title.to_string(),
                description: String::new(),
                subject_id: scene.subject_id,
                class_level: class_level.to_string(),
                platform: "meet".to_string(),
                meeting_link: "https://meet.example.com/abc".to_string(),
                meeting_password: String::new(),
                scheduled_by: owner,
                start_time: start,
                end_time: start + Duration::hours(1),
                auto_record: false,
            },
        )
        .await
        .expect("Failed to create conference");
    }

    let everything = conference::find_visible(pool, &ListScope::All).await.expect("Query failed");
    for (v, want) in scene.viewers() {
        let listed = conference::find_visible(pool, &ListScope::for_viewer(&v)).await.expect("Query failed");
        assert_agrees("conferences", &v, &want, &listed, &everything, |c| c.title.as_str());
    }

    db.teardown().await;
}

#[tokio::test]
async fn test_recording_listing_matches_policy() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let scene = Scene::new(pool).await;

    for (title, class_level, owner) in scene.placements() {
        recording::create(
            pool,
            &NewRecording {
                title: title.to_string(),
                description: String::new(),
                subject_id: scene.subject_id,
                class_level: class_level.to_string(),
                recording_url: format!("https://videos.example.com/{title}.mp4"),
                thumbnail_url: String::new(),
                uploaded_by: owner,
                duration_minutes: 45,
                recorded_date: minutes_ago(60),
                storage_type: StorageType::Url,
                s3_object_key: String::new(),
                file_size_mb: 0.0,
                conference_id: None,
            },
        )
        .await
        .expect("Failed to create recording");
    }

    let all = RecordingFilter::default();
    let everything = recording::find_visible(pool, &ListScope::All, &all).await.expect("Query failed");
    for (v, want) in scene.viewers() {
        let scope = ListScope::for_viewer(&v);
        let listed = recording::find_visible(pool, &scope, &all).await.expect("Query failed");
        assert_agrees("recordings", &v, &want, &listed, &everything, |r| r.title.as_str());

        let count = recording::count_visible(pool, &scope).await.expect("Count failed");
        assert_eq!(count, listed.len() as i64);
    }

    db.teardown().await;
}

#[tokio::test]
async fn test_assignment_listing_matches_policy() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let scene = Scene::new(pool).await;

    for (title, class_level, owner) in scene.placements() {
        assignment::create(
            pool,
            &NewAssignment {
                title: title.to_string(),
                description: String::new(),
                instructions: String::new(),
                subject_id: scene.subject_id,
                class_level: class_level.to_string(),
                created_by: owner,
                difficulty: "easy".to_string(),
                due_date: Utc::now() + Duration::days(7),
                total_points: 10,
                attachment_url: String::new(),
            },
        )
        .await
        .expect("Failed to create assignment");
    }

    let everything = assignment::find_visible(pool, &ListScope::All, 0).await.expect("Query failed");
    for (v, want) in scene.viewers() {
        let listed = assignment::find_visible(pool, &ListScope::for_viewer(&v), v.user_id)
            .await
            .expect("Query failed");
        assert_agrees("assignments", &v, &want, &listed, &everything, |a| a.title.as_str());
    }

    db.teardown().await;
}

#[tokio::test]
async fn test_quiz_listing_matches_policy() {
    let Some(db) = setup_test_db().await else { return };
    let pool = db.pool();
    let scene = Scene::new(pool).await;

    let new_quiz = |title: &str, class_level: &str, owner: i64| NewQuiz {
        title: title.to_string(),
        description: String::new(),
        subject_id: scene.subject_id,
        class_level: class_level.to_string(),
        created_by: owner,
        time_limit: 0,
        passing_score: 70,
    };
    for (title, class_level, owner) in scene.placements() {
        let new = new_quiz(title, class_level, owner);
        let id = quiz::create(pool, &new).await.expect("Failed to create quiz");
        quiz::update(pool, id, &new, true).await.expect("Failed to activate quiz");
    }
    // Inactive quizzes never reach students, even in their own class.
    quiz::create(pool, &new_quiz("draft", CLASS_SIX, scene.author))
        .await
        .expect("Failed to create quiz");

    let everything = quiz::find_visible(pool, &ListScope::All, true).await.expect("Query failed");
    for (v, want) in scene.viewers() {
        let listed = quiz::find_visible(pool, &ListScope::for_viewer(&v), true).await.expect("Query failed");
        assert_agrees("quizzes", &v, &want, &listed, &everything, |q| q.title.as_str());
    }

    let author = viewer(scene.author, Role::Teacher, None);
    let drafts = quiz::find_visible(pool, &ListScope::for_viewer(&author), false)
        .await
        .expect("Query failed");
    assert_eq!(sorted(&drafts, |q| q.title.as_str()), ["draft", "five", "six"]);

    db.teardown().await;
}
