use askama::Template;

use super::{PageContext, SubjectOption};
use crate::models::class_level::ClassLevelOption;
use crate::models::class_subject::ClassSubject;
use crate::models::subject::{Subject, SubjectUsage};

#[derive(Template)]
#[template(path = "subjects/list.html")]
pub struct SubjectListTemplate {
    pub ctx: PageContext,
    pub subjects: Vec<Subject>,
}

#[derive(Template)]
#[template(path = "subjects/detail.html")]
pub struct SubjectDetailTemplate {
    pub ctx: PageContext,
    pub subject: Subject,
    pub usage: SubjectUsage,
    pub classes: Vec<String>,
}

#[derive(Template)]
#[template(path = "subjects/form.html")]
pub struct SubjectFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "subjects/delete.html")]
pub struct SubjectDeleteTemplate {
    pub ctx: PageContext,
    pub subject: Subject,
    pub usage: SubjectUsage,
}

#[derive(Template)]
#[template(path = "subjects/class_subjects.html")]
pub struct ClassSubjectListTemplate {
    pub ctx: PageContext,
    pub assignments: Vec<ClassSubject>,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
}
