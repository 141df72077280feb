use askama::Template;

use super::PageContext;
use crate::models::class_level::ClassLevelOption;
use crate::models::user::{User, UserSummary};

#[derive(Template)]
#[template(path = "management/users.html")]
pub struct UserListTemplate {
    pub ctx: PageContext,
    pub users: Vec<UserSummary>,
    pub role_filter: String,
    pub student_count: i64,
    pub teacher_count: i64,
    pub admin_count: i64,
}

#[derive(Template)]
#[template(path = "management/user_edit.html")]
pub struct UserEditTemplate {
    pub ctx: PageContext,
    pub user: User,
    pub classes: Vec<ClassLevelOption>,
    pub errors: Vec<String>,
}

impl UserEditTemplate {
    pub fn current_class(&self) -> &str {
        self.user.class_level.as_deref().unwrap_or("")
    }
}
