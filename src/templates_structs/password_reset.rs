use askama::Template;

#[derive(Template)]
#[template(path = "password_reset/request.html")]
pub struct PasswordResetRequestTemplate {
    pub app_name: String,
    pub csrf_token: String,
    pub email: String,
    pub errors: Vec<String>,
}

/// New-password form. `valid` is false for unknown, used or expired links.
#[derive(Template)]
#[template(path = "password_reset/confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub app_name: String,
    pub csrf_token: String,
    pub token: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

/// "Check your inbox" and "password changed" pages.
#[derive(Template)]
#[template(path = "password_reset/notice.html")]
pub struct PasswordResetNoticeTemplate {
    pub app_name: String,
    pub heading: String,
    pub message: String,
}
