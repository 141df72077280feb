use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use sqlx::PgPool;

use crate::auth::policy::ListScope;
use crate::auth::session::current_viewer;
use crate::errors::{AppError, render};
use crate::models::{assignment, conference, material, oauth_token, quiz, recording, user};
use crate::services::Services;
use crate::templates_structs::{DashboardCard, DashboardTemplate, PageContext};

fn card(label: &str, value: i64, link: &str) -> DashboardCard {
    DashboardCard { label: label.to_string(), value, link: link.to_string() }
}

pub async fn index(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/dashboard").await?;
    let scope = ListScope::for_viewer(&viewer);
    let now = Utc::now();

    let mut cards = vec![
        card("Study materials", material::count_visible(&pool, &scope).await?, "/materials"),
        card("Upcoming classes", conference::count_upcoming_visible(&pool, &scope).await?, "/conferences"),
        card("Recorded sessions", recording::count_visible(&pool, &scope).await?, "/recordings"),
    ];

    let upcoming_assignments = match (&viewer.class_level, viewer.is_student()) {
        (Some(level), true) => assignment::upcoming_for_student(&pool, level, viewer.user_id, 7).await?,
        _ => vec![],
    };

    if viewer.is_student() {
        cards.push(card("Due this week", upcoming_assignments.len() as i64, "/assignments"));
        let completed = quiz::completed_for_student(&pool, viewer.user_id).await?;
        cards.push(card("Quizzes completed", completed.len() as i64, "/quizzes"));
    } else if viewer.is_teacher() {
        let ungraded = assignment::count_ungraded_for_teacher(&pool, viewer.user_id).await?;
        cards.push(card("Submissions to grade", ungraded, "/assignments"));
    } else {
        let (students, teachers, admins) = user::count_by_role(&pool).await?;
        cards.push(card("Students", students, "/management/users?role=student"));
        cards.push(card("Teachers", teachers, "/management/users?role=teacher"));
        cards.push(card("Admins", admins, "/management/users?role=admin"));
    }

    let upcoming_conferences: Vec<_> = conference::find_visible(&pool, &scope)
        .await?
        .into_iter()
        .filter(|c| c.is_upcoming(now))
        .take(5)
        .collect();

    let zoom_connected = viewer.is_staff() && oauth_token::find_for_user(&pool, viewer.user_id).await?.is_some();

    let tmpl = DashboardTemplate {
        ctx,
        cards,
        upcoming_conferences,
        upcoming_assignments,
        zoom_connected,
        zoom_oauth_available: viewer.is_staff() && services.zoom_oauth.is_some(),
    };
    render(tmpl)
}
