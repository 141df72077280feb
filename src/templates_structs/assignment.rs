use askama::Template;

use super::{PageContext, SubjectOption};
use crate::models::assignment::{Assignment, AssignmentListItem, Submission};
use crate::models::class_level::ClassLevelOption;

#[derive(Template)]
#[template(path = "assignments/list.html")]
pub struct AssignmentListTemplate {
    pub ctx: PageContext,
    pub assignments: Vec<AssignmentListItem>,
    pub now: chrono::DateTime<chrono::Utc>,
}

#[derive(Template)]
#[template(path = "assignments/detail.html")]
pub struct AssignmentDetailTemplate {
    pub ctx: PageContext,
    pub assignment: Assignment,
    pub past_due: bool,
    /// The viewing student's own submission.
    pub my_submission: Option<Submission>,
    /// Every submission, for the owning teacher or an admin.
    pub submissions: Vec<Submission>,
    pub can_grade: bool,
}

#[derive(Template)]
#[template(path = "assignments/form.html")]
pub struct AssignmentFormTemplate {
    pub ctx: PageContext,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
    pub difficulties: Vec<&'static str>,
    pub errors: Vec<String>,
    pub title: String,
    pub description: String,
    pub instructions: String,
    pub subject_id: i64,
    pub class_level: String,
    pub difficulty: String,
    pub due_date: String,
    pub total_points: i32,
    pub attachment_url: String,
}
