use actix_web::{HttpResponse, middleware::from_fn, web};

use crate::auth::middleware::{json_content_type, require_auth, require_paid};
use crate::handlers::{
    assignment_handlers, auth_handlers, conference_handlers, dashboard, learning_handlers,
    management_handlers, material_handlers, password_reset_handlers, payment_handlers, profile_handlers,
    quiz_handlers, recording_handlers, subject_handlers, tutor_handlers,
};

/// Register every route. Session middleware and app data are the caller's job.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Public routes
        .route("/", web::get().to(auth_handlers::home))
        .route("/login", web::get().to(auth_handlers::login_page))
        .route("/login", web::post().to(auth_handlers::login_submit))
        .route("/register", web::get().to(auth_handlers::register_page))
        .route("/register", web::post().to(auth_handlers::register_submit))
        .route("/password-reset", web::get().to(password_reset_handlers::request_page))
        .route("/password-reset", web::post().to(password_reset_handlers::request_submit))
        .route("/password-reset/done", web::get().to(password_reset_handlers::done_page))
        .route("/reset/done", web::get().to(password_reset_handlers::complete_page))
        .route("/reset/{token}", web::get().to(password_reset_handlers::confirm_page))
        .route("/reset/{token}", web::post().to(password_reset_handlers::confirm_submit))
        .route("/payment/success", web::get().to(payment_handlers::success))
        .route("/payment/cancel", web::get().to(payment_handlers::cancel))
        .route("/payment/webhook", web::post().to(payment_handlers::webhook))
        // JSON API
        .service(
            web::scope("/api")
                .wrap(from_fn(json_content_type))
                .wrap(from_fn(require_paid))
                .wrap(from_fn(require_auth))
                .route("/conferences/{id}/signature", web::get().to(conference_handlers::live::signature))
                .route("/quiz/responses", web::post().to(quiz_handlers::take::save_response))
                .route("/quiz/submit", web::post().to(quiz_handlers::take::submit))
                .route("/tutor/ask", web::post().to(tutor_handlers::api::ask))
                .route("/tutor/thread-reply", web::post().to(tutor_handlers::api::thread_reply))
                .route("/tutor/edit-message", web::post().to(tutor_handlers::api::edit_message))
                .route("/tutor/practice-questions", web::post().to(tutor_handlers::api::practice_questions))
                .route("/tutor/sessions/{id}/rename", web::post().to(tutor_handlers::api::rename))
                .route("/tutor/sessions/{id}/pin", web::post().to(tutor_handlers::api::toggle_pin))
                .route("/tutor/sessions/{id}/delete", web::post().to(tutor_handlers::api::delete_session))
                .route("/tutor/end-session", web::post().to(tutor_handlers::api::end_session)),
        )
        // Protected routes; require_auth runs first (outermost wrap)
        .service(
            web::scope("")
                .wrap(from_fn(require_paid))
                .wrap(from_fn(require_auth))
                .route("/logout", web::post().to(auth_handlers::logout))
                .route("/dashboard", web::get().to(dashboard::index))
                // Profile: /profile/edit BEFORE /profile/{username}
                .route("/profile/edit", web::get().to(profile_handlers::edit_form))
                .route("/profile/edit", web::post().to(profile_handlers::edit_submit))
                .route("/profile/{username}", web::get().to(profile_handlers::view))
                .route("/settings", web::get().to(profile_handlers::settings_page))
                .route("/settings", web::post().to(profile_handlers::settings_save))
                // Subjects: /subjects/new BEFORE /subjects/{id}
                .route("/subjects", web::get().to(subject_handlers::crud::list))
                .route("/subjects/new", web::get().to(subject_handlers::crud::new_form))
                .route("/subjects", web::post().to(subject_handlers::crud::create))
                .route("/subjects/{id}", web::get().to(subject_handlers::crud::detail))
                .route("/subjects/{id}/edit", web::get().to(subject_handlers::crud::edit_form))
                .route("/subjects/{id}", web::post().to(subject_handlers::crud::update))
                .route("/subjects/{id}/delete", web::get().to(subject_handlers::crud::delete_confirm))
                .route("/subjects/{id}/delete", web::post().to(subject_handlers::crud::delete))
                .route("/class-subjects", web::get().to(subject_handlers::class_subjects::list))
                .route("/class-subjects", web::post().to(subject_handlers::class_subjects::create))
                .route("/class-subjects/{id}", web::post().to(subject_handlers::class_subjects::update))
                .route("/class-subjects/{id}/delete", web::post().to(subject_handlers::class_subjects::delete))
                // Materials
                .route("/materials", web::get().to(material_handlers::list))
                .route("/materials/new", web::get().to(material_handlers::new_form))
                .route("/materials", web::post().to(material_handlers::create))
                .route("/materials/{id}", web::get().to(material_handlers::detail))
                .route("/materials/{id}/download", web::get().to(material_handlers::download))
                // Conferences
                .route("/conferences", web::get().to(conference_handlers::crud::list))
                .route("/conferences/new", web::get().to(conference_handlers::crud::new_form))
                .route("/conferences", web::post().to(conference_handlers::crud::create))
                .route("/conferences/{id}", web::get().to(conference_handlers::crud::detail))
                .route("/conferences/{id}/edit", web::get().to(conference_handlers::crud::edit_form))
                .route("/conferences/{id}", web::post().to(conference_handlers::crud::update))
                .route("/conferences/{id}/delete", web::post().to(conference_handlers::crud::delete))
                .route("/conferences/{id}/join", web::get().to(conference_handlers::live::join))
                .route("/conferences/{id}/zoom/retry", web::post().to(conference_handlers::crud::retry_zoom))
                .route("/conferences/{id}/auto-record", web::post().to(conference_handlers::live::toggle_auto_record))
                .route("/conferences/{id}/recordings/import", web::post().to(conference_handlers::live::import_recordings))
                .route("/zoom/oauth/authorize", web::get().to(conference_handlers::zoom_oauth::authorize))
                .route("/zoom/oauth/callback", web::get().to(conference_handlers::zoom_oauth::callback))
                .route("/zoom/meetings", web::get().to(conference_handlers::zoom_oauth::meetings))
                .route(
                    "/zoom/meetings/{meeting_id}/delete",
                    web::post().to(conference_handlers::zoom_oauth::delete_meeting),
                )
                // Recordings
                .route("/recordings", web::get().to(recording_handlers::list))
                .route("/recordings/new", web::get().to(recording_handlers::new_form))
                .route("/recordings", web::post().to(recording_handlers::create))
                .route("/recordings/{id}", web::get().to(recording_handlers::detail))
                .route("/recordings/{id}/edit", web::get().to(recording_handlers::edit_form))
                .route("/recordings/{id}", web::post().to(recording_handlers::update))
                .route("/recordings/{id}/delete", web::post().to(recording_handlers::delete))
                // Assignments
                .route("/assignments", web::get().to(assignment_handlers::list))
                .route("/assignments/new", web::get().to(assignment_handlers::new_form))
                .route("/assignments", web::post().to(assignment_handlers::create))
                .route("/assignments/{id}", web::get().to(assignment_handlers::detail))
                .route("/assignments/{id}/submit", web::post().to(assignment_handlers::submit))
                .route("/submissions/{id}/grade", web::post().to(assignment_handlers::grade))
                // Quizzes
                .route("/quizzes", web::get().to(quiz_handlers::manage::list))
                .route("/quizzes/new", web::get().to(quiz_handlers::manage::new_form))
                .route("/quizzes", web::post().to(quiz_handlers::manage::create))
                .route("/quizzes/{id}", web::get().to(quiz_handlers::manage::detail))
                .route("/quizzes/{id}/edit", web::get().to(quiz_handlers::manage::edit_form))
                .route("/quizzes/{id}", web::post().to(quiz_handlers::manage::update))
                .route("/quizzes/{id}/questions", web::post().to(quiz_handlers::manage::add_question))
                .route("/quizzes/{id}/generate", web::post().to(quiz_handlers::manage::generate))
                .route("/quizzes/{id}/take", web::get().to(quiz_handlers::take::take))
                .route("/quizzes/{id}/results/{attempt_id}", web::get().to(quiz_handlers::take::results))
                // AI tutor
                .route("/tutor", web::get().to(tutor_handlers::pages::chat))
                .route("/tutor/history", web::get().to(tutor_handlers::pages::history))
                .route("/tutor/history/{id}", web::get().to(tutor_handlers::pages::session_detail))
                .route("/tutor/history/{id}/email", web::post().to(tutor_handlers::pages::email_transcript))
                // Learning insights
                .route("/learning/weekly-summary", web::get().to(learning_handlers::weekly_summary))
                .route("/learning/weekly-summary/email", web::post().to(learning_handlers::email_weekly_summary))
                .route("/learning/improvement-areas", web::get().to(learning_handlers::improvement_areas))
                // Payment
                .route("/payment/checkout/{user_id}", web::get().to(payment_handlers::checkout))
                // User management
                .route("/management/users", web::get().to(management_handlers::list))
                .route("/management/users/{id}/edit", web::get().to(management_handlers::edit_form))
                .route("/management/users/{id}", web::post().to(management_handlers::update))
                .route("/management/users/{id}/toggle-active", web::post().to(management_handlers::toggle_active)),
        );
}

/// Fallback for unmatched paths. Register last.
pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type("text/html; charset=utf-8")
        .body(include_str!("../templates/errors/404.html"))
}
