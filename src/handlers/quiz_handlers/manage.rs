use actix_session::Session;
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::auth::policy::{ListScope, Viewer, can_manage, require_manage, require_staff, require_view};
use crate::auth::session::current_viewer;
use crate::auth::{csrf, validate};
use crate::errors::{AppError, render};
use crate::handlers::{check_placement, flash_redirect};
use crate::models::quiz::{self, GenerateForm, NewQuestion, NewQuiz, Quiz, QuestionForm, QuizForm};
use crate::models::subject;
use crate::services::Services;
use crate::templates_structs::{
    PageContext, QuizDetailTemplate, QuizEditTemplate, QuizFormTemplate, QuizListTemplate, class_options,
    subject_options,
};

pub async fn list(
    pool: web::Data<PgPool>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let quizzes = quiz::find_visible(&pool, &ListScope::for_viewer(&viewer), viewer.is_student()).await?;
    let completed = if viewer.is_student() {
        quiz::completed_for_student(&pool, viewer.user_id).await?
    } else {
        vec![]
    };
    let ctx = PageContext::build(&session, &pool, &viewer, "/quizzes").await?;
    render(QuizListTemplate { ctx, quizzes, completed })
}

/// Loads a quiz the viewer may see. Inactive quizzes are hidden from students.
pub(super) async fn visible_quiz(pool: &PgPool, viewer: &Viewer, id: i64) -> Result<Quiz, AppError> {
    let found = quiz::find_by_id(pool, id).await?.ok_or(AppError::NotFound)?;
    require_view(viewer, &found)?;
    if viewer.is_student() && !found.is_active {
        return Err(AppError::NotFound);
    }
    Ok(found)
}

pub async fn detail(
    pool: web::Data<PgPool>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = visible_quiz(&pool, &viewer, path.into_inner()).await?;

    let stats = quiz::stats(&pool, found.id).await?;
    let attempts = if viewer.is_student() {
        quiz::attempts_for_student(&pool, found.id, viewer.user_id).await?
    } else {
        vec![]
    };
    let can_take = viewer.is_student() && found.is_active && found.question_count > 0;
    let ctx = PageContext::build(&session, &pool, &viewer, "/quizzes").await?;

    render(QuizDetailTemplate {
        ctx,
        can_manage: can_manage(&viewer, &found),
        quiz: found,
        stats,
        attempts,
        can_take,
    })
}

async fn check_quiz_form(pool: &PgPool, viewer: &Viewer, form: &QuizForm) -> Result<Result<NewQuiz, Vec<String>>, AppError> {
    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_required(&form.title, "Title", 200));
    errors.extend(validate::validate_optional(&form.description, "Description", 5000));
    check_placement(pool, form.subject_id, &form.class_level, &mut errors).await?;
    if !(0..=300).contains(&form.time_limit) {
        errors.push("Time limit must be between 0 and 300 minutes".to_string());
    }
    if !(0..=100).contains(&form.passing_score) {
        errors.push("Passing score must be between 0 and 100".to_string());
    }
    if !errors.is_empty() {
        return Ok(Err(errors));
    }

    Ok(Ok(NewQuiz {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        subject_id: form.subject_id,
        class_level: form.class_level.trim().to_string(),
        created_by: viewer.user_id,
        time_limit: form.time_limit,
        passing_score: form.passing_score,
    }))
}

async fn form_page(
    session: &Session,
    pool: &PgPool,
    viewer: &Viewer,
    form: Option<&QuizForm>,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let subjects = subject::find_all(pool).await?;
    let ctx = PageContext::build(session, pool, viewer, "/quizzes").await?;
    render(QuizFormTemplate {
        ctx,
        subjects: subject_options(&subjects),
        classes: class_options(),
        errors,
        title: form.map(|f| f.title.clone()).unwrap_or_default(),
        description: form.map(|f| f.description.clone()).unwrap_or_default(),
        subject_id: form.map(|f| f.subject_id).unwrap_or(0),
        class_level: form
            .map(|f| f.class_level.clone())
            .unwrap_or_else(|| viewer.class_level.clone().unwrap_or_default()),
        time_limit: form.map(|f| f.time_limit).unwrap_or(30),
        passing_score: form.map(|f| f.passing_score).unwrap_or(70),
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

/// New quizzes start inactive so questions can be added first.
pub async fn create(
    pool: web::Data<PgPool>,
    session: Session,
    form: web::Form<QuizForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    require_staff(&viewer)?;

    let new = match check_quiz_form(&pool, &viewer, &form).await? {
        Ok(new) => new,
        Err(errors) => return form_page(&session, &pool, &viewer, Some(&form), errors).await,
    };

    let id = quiz::create(&pool, &new).await?;
    log::info!("Quiz {id} '{}' created by user {}", new.title, viewer.user_id);
    Ok(flash_redirect(&session, "Quiz created. Add questions, then activate it.", &format!("/quizzes/{id}/edit")))
}

async fn edit_page(
    session: &Session,
    pool: &PgPool,
    services: &Services,
    viewer: &Viewer,
    found: Quiz,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let questions = quiz::questions(pool, found.id).await?;
    let ctx = PageContext::build(session, pool, viewer, "/quizzes").await?;
    render(QuizEditTemplate {
        ctx,
        quiz: found,
        questions,
        errors,
        ai_enabled: services.tutor.is_configured(),
    })
}

pub async fn edit_form(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let viewer = current_viewer(&session, &pool).await?;
    let found = quiz::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;
    edit_page(&session, &pool, &services, &viewer, found, vec![]).await
}

pub async fn update(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<QuizForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let found = quiz::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;

    let mut new = match check_quiz_form(&pool, &viewer, &form).await? {
        Ok(new) => new,
        Err(errors) => return edit_page(&session, &pool, &services, &viewer, found, errors).await,
    };
    new.created_by = found.created_by;

    let activate = form.is_active.is_some();
    if activate && found.question_count == 0 {
        let errors = vec!["Add at least one question before activating the quiz".to_string()];
        return edit_page(&session, &pool, &services, &viewer, found, errors).await;
    }

    quiz::update(&pool, found.id, &new, activate).await?;
    Ok(flash_redirect(&session, "Quiz updated", &format!("/quizzes/{}/edit", found.id)))
}

fn check_question(form: &QuestionForm) -> Result<NewQuestion, Vec<String>> {
    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_required(&form.question_text, "Question", 2000));
    errors.extend(validate::validate_required(&form.option_a, "Option A", 500));
    errors.extend(validate::validate_optional(&form.option_b, "Option B", 500));
    errors.extend(validate::validate_optional(&form.option_c, "Option C", 500));
    errors.extend(validate::validate_optional(&form.option_d, "Option D", 500));

    let correct = form.correct_option.trim().to_ascii_lowercase();
    let chosen_text = match correct.as_str() {
        "a" => form.option_a.trim(),
        "b" => form.option_b.trim(),
        "c" => form.option_c.trim(),
        "d" => form.option_d.trim(),
        _ => "",
    };
    if !validate::is_valid_option(&correct) || chosen_text.is_empty() {
        errors.push("The correct answer must be one of the filled-in options".to_string());
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewQuestion {
        question_text: form.question_text.trim().to_string(),
        option_a: form.option_a.trim().to_string(),
        option_b: form.option_b.trim().to_string(),
        option_c: form.option_c.trim().to_string(),
        option_d: form.option_d.trim().to_string(),
        correct_option: correct,
        explanation: form.explanation.trim().to_string(),
    })
}

pub async fn add_question(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<QuestionForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let found = quiz::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;

    let question = match check_question(&form) {
        Ok(q) => q,
        Err(errors) => return edit_page(&session, &pool, &services, &viewer, found, errors).await,
    };

    quiz::add_questions(&pool, found.id, &[question]).await?;
    Ok(flash_redirect(&session, "Question added", &format!("/quizzes/{}/edit", found.id)))
}

/// Draft questions from the model; the teacher edits the placeholder options.
pub async fn generate(
    pool: web::Data<PgPool>,
    services: web::Data<Services>,
    session: Session,
    path: web::Path<i64>,
    form: web::Form<GenerateForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    let viewer = current_viewer(&session, &pool).await?;
    let found = quiz::find_by_id(&pool, path.into_inner()).await?.ok_or(AppError::NotFound)?;
    require_manage(&viewer, &found)?;
    let back = format!("/quizzes/{}/edit", found.id);

    let topic = match form.topic.trim() {
        "" => format!("{} for {}", found.subject_name, found.class_label()),
        t => t.to_string(),
    };

    match services.tutor.practice_questions(&topic, form.num_questions, "medium").await {
        Ok(generated) if generated.is_empty() => {
            Ok(flash_redirect(&session, "The model returned no usable questions", &back))
        }
        Ok(generated) => {
            let new: Vec<NewQuestion> = generated.into_iter().map(|q| q.into_quiz_question()).collect();
            let ids = quiz::add_questions(&pool, found.id, &new).await?;
            log::info!("Generated {} questions for quiz {}", ids.len(), found.id);
            Ok(flash_redirect(
                &session,
                format!("Added {} generated question(s). Review the options before activating.", ids.len()),
                &back,
            ))
        }
        Err(e) => {
            log::warn!("Question generation for quiz {} failed: {e}", found.id);
            Ok(flash_redirect(&session, format!("Could not generate questions: {e}"), &back))
        }
    }
}
