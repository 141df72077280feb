use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::auth::policy::{ListScope, can_manage, require_manage, require_role, require_staff, require_view};
use crate::auth::session::current_viewer;
use crate::auth::{csrf, validate};
use crate::errors::{AppError, render};
use crate::handlers::{check_placement, flash_redirect};
use crate::models::assignment::{
    self, Assignment, AssignmentForm, DIFFICULTIES, GradeError, GradeForm, NewAssignment, SubmissionForm,
    SubmitOutcome,
};
use crate::models::conference::parse_local_datetime;
use crate::models::settings::{self, NotificationKind};
use crate::models::subject;
use crate::models::user::{self, Role};
use crate::services::Services;
use crate::services::notify::messages;
use crate::templates_structs::{
    AssignmentDetailTemplate, AssignmentFormTemplate, AssignmentListTemplate, PageContext, class_options,
    subject_options,
};

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let assignments = assignment::find_visible(&pool, &ListScope::for_viewer(&viewer), viewer.user_id).await?;
    let ctx = PageContext::build(&session, &pool, &viewer, "/assignments").await?;
    render(AssignmentListTemplate { ctx, assignments, now: Utc::now() })
}

/// Students see their own submission; the owner and admins see all of them.
pub async fn detail(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = assignment::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_view(&viewer, &found)?;

    let can_grade = can_manage(&viewer, &found);
    let my_submission = if viewer.is_student() {
        assignment::find_submission_for(&pool, found.id, viewer.user_id).await?
    } else {
        None
    };
    let submissions = if can_grade {
        assignment::submissions_for(&pool, found.id).await?
    } else {
        vec![]
    };

    let ctx = PageContext::build(&session, &pool, &viewer, "/assignments").await?;
    render(AssignmentDetailTemplate {
        ctx,
        past_due: found.is_past_due(Utc::now()),
        assignment: found,
        my_submission,
        submissions,
        can_grade,
    })
}

async fn form_page(
    session: &Session,
    pool: &PgPool,
    viewer: &crate::auth::policy::Viewer,
    form: Option<&AssignmentForm>,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let subjects = subject::find_all(pool).await?;
    let ctx = PageContext::build(session, pool, viewer, "/assignments").await?;
    let default_due = (Utc::now() + Duration::days(7)).format("%Y-%m-%dT%H:%M").to_string();

    render(AssignmentFormTemplate {
        ctx,
        subjects: subject_options(&subjects),
        classes: class_options(),
        difficulties: DIFFICULTIES.to_vec(),
        errors,
        title: form.map(|f| f.title.clone()).unwrap_or_default(),
        description: form.map(|f| f.description.clone()).unwrap_or_default(),
        instructions: form.map(|f| f.instructions.clone()).unwrap_or_default(),
        subject_id: form.map(|f| f.subject_id).unwrap_or(0),
        class_level: form
            .map(|f| f.class_level.clone())
            .unwrap_or_else(|| viewer.class_level.clone().unwrap_or_default()),
        difficulty: form.map(|f| f.difficulty.clone()).unwrap_or_else(|| "medium".to_string()),
        due_date: form.map(|f| f.due_date.clone()).unwrap_or(default_due),
        total_points: form.map(|f| f.total_points).unwrap_or(100),
        attachment_url: form.map(|f| f.attachment_url.clone()).unwrap_or_default(),
    })
}

pub async fn new_form(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;
    form_page(&session, &pool, &viewer, None, vec![]).await
}

/// Publishes the assignment and emails the class.
pub async fn create(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    form: web::Form<AssignmentForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_required(&form.title, "Title", 200));
    errors.extend(validate::validate_optional(&form.description, "Description", 5000));
    errors.extend(validate::validate_optional(&form.instructions, "Instructions", 10000));
    check_placement(&pool, form.subject_id, &form.class_level, &mut errors).await?;
    if !DIFFICULTIES.contains(&form.difficulty.as_str()) {
        errors.push("Choose a valid difficulty".to_string());
    }
    if form.total_points < 1 {
        errors.push("Total points must be at least 1".to_string());
    }
    let attachment = form.attachment_url.trim();
    if !attachment.is_empty() {
        errors.extend(validate::validate_url(attachment, "Attachment"));
    }
    let due_date = parse_local_datetime(&form.due_date);
    if due_date.is_none() {
        errors.push("Due date is required".to_string());
    }

    let Some(due_date) = due_date.filter(|_| errors.is_empty()) else {
        return form_page(&session, &pool, &viewer, Some(&form), errors).await;
    };

    let new = NewAssignment {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        instructions: form.instructions.trim().to_string(),
        subject_id: form.subject_id,
        class_level: form.class_level.trim().to_string(),
        created_by: viewer.user_id,
        difficulty: form.difficulty.clone(),
        due_date,
        total_points: form.total_points,
        attachment_url: attachment.to_string(),
    };
    let id = assignment::create(&pool, &new).await?;
    log::info!("Assignment {id} '{}' published for class {} by user {}", new.title, new.class_level, viewer.user_id);

    if let Some(created) = assignment::find_by_id(&pool, id).await? {
        notify_class(&pool, &services, &created).await?;
    }

    Ok(flash_redirect(&session, "Assignment published", &format!("/assignments/{id}")))
}

async fn notify_class(pool: &PgPool, services: &Services, a: &Assignment) -> Result<(), AppError> {
    let students: Vec<i64> = user::find_in_class(pool, &a.class_level, Some(Role::Student))
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    let recipients = settings::opted_in(pool, &students, NotificationKind::Assignments).await?;
    let link = services.config.absolute_url(&format!("/assignments/{}", a.id));

    for student in user::find_by_ids(pool, &recipients).await? {
        if student.email.is_empty() {
            continue;
        }
        let mail = messages::assignment_published(services.app_name(), &student.email, a, &link);
        services.notifier.send_in_background(mail);
    }
    Ok(())
}

/// One submission per student. Late work is accepted and flagged.
pub async fn submit(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<SubmissionForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_role(&viewer, &[Role::Student])?;

    let found = assignment::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_view(&viewer, &found)?;
    let back = format!("/assignments/{}", found.id);

    let text = form.submission_text.trim();
    let attachment = form.attachment_url.trim();
    if text.is_empty() && attachment.is_empty() {
        return Ok(flash_redirect(&session, "Write an answer or attach a link before submitting", &back));
    }
    if !attachment.is_empty() {
        if let Some(e) = validate::validate_url(attachment, "Attachment") {
            return Ok(flash_redirect(&session, e, &back));
        }
    }

    let message = match assignment::submit(&pool, &found, viewer.user_id, text, attachment, Utc::now()).await? {
        SubmitOutcome::Submitted { id, late } => {
            log::info!("Submission {id} for assignment {} by user {} (late: {late})", found.id, viewer.user_id);
            if late { "Submitted after the due date" } else { "Assignment submitted" }
        }
        SubmitOutcome::AlreadySubmitted => "You have already submitted this assignment",
    };
    Ok(flash_redirect(&session, message, &back))
}

/// Grading by the assignment's owner or an admin.
pub async fn grade(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<GradeForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;

    let submission = assignment::find_submission(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    let parent = assignment::find_by_id(&pool, submission.assignment_id).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &parent)?;
    let back = format!("/assignments/{}", parent.id);

    let message = match assignment::grade(&pool, &submission, form.points_earned, form.feedback.trim(), viewer.user_id).await? {
        Ok(()) => {
            log::info!("Submission {} graded {} by user {}", submission.id, form.points_earned, viewer.user_id);
            format!("Graded {}: {}/{}", submission.student_name, form.points_earned, submission.total_points)
        }
        Err(GradeError::PointsOutOfRange { max }) => format!("Points must be between 0 and {max}"),
        Err(GradeError::NotFound) => return Err(AppError::NotFound),
    };
    Ok(flash_redirect(&session, message, &back))
}
