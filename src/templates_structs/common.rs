use askama::Template;

use super::PageContext;
use crate::models::class_level::ClassLevelOption;
use crate::models::settings::UserSettings;
use crate::models::user::User;

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub app_name: String,
    pub logged_in: bool,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub flash: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub app_name: String,
    pub csrf_token: String,
    pub errors: Vec<String>,
    pub classes: Vec<ClassLevelOption>,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub class_level: String,
    pub payments_enabled: bool,
}

/// Public view of a user; never carries the password hash.
pub struct ProfileView {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role_label: String,
    pub class_label: String,
    pub bio: String,
    pub phone_number: String,
    pub payment_status: String,
    pub joined: String,
}

impl From<&User> for ProfileView {
    fn from(u: &User) -> Self {
        Self {
            username: u.username.clone(),
            display_name: u.name().to_string(),
            email: u.email.clone(),
            role_label: u.role().label().to_string(),
            class_label: u
                .class_level
                .as_deref()
                .map(crate::models::class_level::label)
                .unwrap_or_else(|| "-".to_string()),
            bio: u.bio.clone(),
            phone_number: u.phone_number.clone(),
            payment_status: u.payment_status.clone(),
            joined: u.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "profile/view.html")]
pub struct ProfileTemplate {
    pub ctx: PageContext,
    pub profile: ProfileView,
    pub is_self: bool,
}

#[derive(Template)]
#[template(path = "profile/edit.html")]
pub struct ProfileEditTemplate {
    pub ctx: PageContext,
    pub errors: Vec<String>,
    pub display_name: String,
    pub email: String,
    pub bio: String,
    pub phone_number: String,
    pub class_level: String,
    pub classes: Vec<ClassLevelOption>,
    /// Students keep the class set at registration or by an admin.
    pub can_change_class: bool,
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub ctx: PageContext,
    pub settings: UserSettings,
    pub classes: Vec<ClassLevelOption>,
    pub font_sizes: Vec<&'static str>,
    pub learning_styles: Vec<&'static str>,
    pub response_lengths: Vec<&'static str>,
}

impl SettingsTemplate {
    pub fn default_class(&self) -> &str {
        self.settings.default_class_level.as_deref().unwrap_or("")
    }
}
