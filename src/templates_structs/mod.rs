// Template context structures for Askama templates, organized by domain.
// All types are re-exported: `use classlearn::templates_structs::*`

use actix_session::Session;
use sqlx::PgPool;

use crate::auth::csrf;
use crate::auth::policy::Viewer;
use crate::auth::session::take_flash;
use crate::errors::AppError;
use crate::models::class_level::{self, ClassLevelOption};
use crate::models::settings;

/// Common context shared by all authenticated pages.
/// Templates access these as `ctx.username`, `ctx.role`, etc.
pub struct PageContext {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub avatar_initial: String,
    pub role: String,
    pub role_label: String,
    pub class_level: Option<String>,
    pub class_label: String,
    pub flash: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
    pub theme: String,
    pub font_size: String,
    pub current_path: String,
}

impl PageContext {
    pub async fn build(
        session: &Session,
        pool: &PgPool,
        viewer: &Viewer,
        current_path: &str,
    ) -> Result<Self, AppError> {
        let flash = take_flash(session);
        let csrf_token = csrf::get_or_create_token(session);
        let prefs = settings::get_or_create(pool, viewer.user_id).await?;
        let display_name = viewer.name().to_string();
        let avatar_initial = display_name.chars().next().unwrap_or('?').to_uppercase().to_string();

        Ok(Self {
            user_id: viewer.user_id,
            username: viewer.username.clone(),
            display_name,
            avatar_initial,
            role: viewer.role.as_str().to_string(),
            role_label: viewer.role.label().to_string(),
            class_level: viewer.class_level.clone(),
            class_label: viewer
                .class_level
                .as_deref()
                .map(class_level::label)
                .unwrap_or_default(),
            flash,
            app_name: crate::config::app_name(),
            csrf_token,
            theme: if prefs.dark_mode { "dark".to_string() } else { "light".to_string() },
            font_size: prefs.font_size,
            current_path: current_path.to_string(),
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn is_staff(&self) -> bool {
        self.role == "admin" || self.role == "teacher"
    }

    pub fn is_student(&self) -> bool {
        self.role == "student"
    }

    /// "active" for the nav entry owning the current page.
    pub fn nav_class(&self, prefix: &str) -> &'static str {
        if self.current_path.starts_with(prefix) { "active" } else { "" }
    }
}

/// Subject `<select>` entry.
pub struct SubjectOption {
    pub id: i64,
    pub name: String,
}

impl From<&crate::models::subject::Subject> for SubjectOption {
    fn from(s: &crate::models::subject::Subject) -> Self {
        Self { id: s.id, name: s.name.clone() }
    }
}

pub fn subject_options(subjects: &[crate::models::subject::Subject]) -> Vec<SubjectOption> {
    subjects.iter().map(SubjectOption::from).collect()
}

pub fn class_options() -> Vec<ClassLevelOption> {
    class_level::options()
}

mod assignment;
mod common;
mod conference;
mod dashboard;
mod learning;
mod material;
mod password_reset;
mod payment;
mod quiz;
mod recording;
mod subject;
mod tutor;
mod user;

pub use self::assignment::{AssignmentDetailTemplate, AssignmentFormTemplate, AssignmentListTemplate};
pub use self::common::{
    HomeTemplate, LoginTemplate, ProfileEditTemplate, ProfileTemplate, ProfileView, RegisterTemplate,
    SettingsTemplate,
};
pub use self::conference::{
    AccountMeetingRow, ConferenceDetailTemplate, ConferenceFormTemplate, ConferenceJoinTemplate,
    ConferenceListTemplate, ConferenceValues, InviteeOption, ZoomMeetingsTemplate,
};
pub use self::dashboard::{DashboardCard, DashboardTemplate};
pub use self::password_reset::{
    PasswordResetConfirmTemplate, PasswordResetNoticeTemplate, PasswordResetRequestTemplate,
};
pub use self::learning::{ImprovementAreasTemplate, WeeklySummaryTemplate};
pub use self::material::{MaterialDetailTemplate, MaterialFormTemplate, MaterialListTemplate};
pub use self::payment::{CheckoutTemplate, PaymentResultTemplate};
pub use self::quiz::{
    QuizDetailTemplate, QuizEditTemplate, QuizFormTemplate, QuizListTemplate, QuizResultsTemplate,
    QuizTakeTemplate, TakeQuestion,
};
pub use self::recording::{RecordingDetailTemplate, RecordingFormTemplate, RecordingListTemplate};
pub use self::subject::{
    ClassSubjectListTemplate, SubjectDeleteTemplate, SubjectDetailTemplate, SubjectFormTemplate,
    SubjectListTemplate,
};
pub use self::tutor::{TutorHistoryTemplate, TutorSessionTemplate, TutorTemplate};
pub use self::user::{UserEditTemplate, UserListTemplate};
