use serde::Deserialize;
use sqlx::PgPool;

pub const FONT_SIZES: &[&str] = &["small", "medium", "large"];
pub const LEARNING_STYLES: &[&str] = &["visual", "auditory", "reading", "kinesthetic"];
pub const RESPONSE_LENGTHS: &[&str] = &["short", "medium", "long"];

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserSettings {
    pub user_id: i64,
    pub email_assignments: bool,
    pub email_meetings: bool,
    pub email_weekly_summary: bool,
    pub email_login_notification: bool,
    pub dark_mode: bool,
    pub font_size: String,
    pub preferred_learning_style: String,
    pub default_class_level: Option<String>,
    pub ai_response_length: String,
}

/// Checkboxes are absent from the form body when unticked.
#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub email_assignments: Option<String>,
    #[serde(default)]
    pub email_meetings: Option<String>,
    #[serde(default)]
    pub email_weekly_summary: Option<String>,
    #[serde(default)]
    pub email_login_notification: Option<String>,
    #[serde(default)]
    pub dark_mode: Option<String>,
    pub font_size: String,
    pub preferred_learning_style: String,
    #[serde(default)]
    pub default_class_level: String,
    pub ai_response_length: String,
    pub csrf_token: String,
}

const SELECT_SETTINGS: &str = "\
    SELECT user_id, email_assignments, email_meetings, email_weekly_summary, email_login_notification, \
           dark_mode, font_size, preferred_learning_style, default_class_level, ai_response_length \
    FROM user_settings WHERE user_id = $1";

/// Settings row for a user, created with defaults on first access.
pub async fn get_or_create(pool: &PgPool, user_id: i64) -> Result<UserSettings, sqlx::Error> {
    sqlx::query("INSERT INTO user_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    sqlx::query_as::<_, UserSettings>(SELECT_SETTINGS)
        .bind(user_id)
        .fetch_one(pool)
        .await
}

pub async fn save(pool: &PgPool, s: &UserSettings) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_settings (user_id, email_assignments, email_meetings, email_weekly_summary, \
             email_login_notification, dark_mode, font_size, preferred_learning_style, \
             default_class_level, ai_response_length) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (user_id) DO UPDATE SET \
             email_assignments = EXCLUDED.email_assignments, \
             email_meetings = EXCLUDED.email_meetings, \
             email_weekly_summary = EXCLUDED.email_weekly_summary, \
             email_login_notification = EXCLUDED.email_login_notification, \
             dark_mode = EXCLUDED.dark_mode, \
             font_size = EXCLUDED.font_size, \
             preferred_learning_style = EXCLUDED.preferred_learning_style, \
             default_class_level = EXCLUDED.default_class_level, \
             ai_response_length = EXCLUDED.ai_response_length",
    )
    .bind(s.user_id)
    .bind(s.email_assignments)
    .bind(s.email_meetings)
    .bind(s.email_weekly_summary)
    .bind(s.email_login_notification)
    .bind(s.dark_mode)
    .bind(&s.font_size)
    .bind(&s.preferred_learning_style)
    .bind(&s.default_class_level)
    .bind(&s.ai_response_length)
    .execute(pool)
    .await?;
    Ok(())
}

/// Recipients who opted in to a given notification column.
pub async fn opted_in(pool: &PgPool, user_ids: &[i64], column: NotificationKind) -> Result<Vec<i64>, sqlx::Error> {
    let sql = format!(
        "SELECT u.id FROM users u \
         LEFT JOIN user_settings s ON s.user_id = u.id \
         WHERE u.id = ANY($1) AND COALESCE(s.{}, TRUE)",
        column.column()
    );
    sqlx::query_scalar(&sql).bind(user_ids).fetch_all(pool).await
}

#[derive(Debug, Clone, Copy)]
pub enum NotificationKind {
    Assignments,
    Meetings,
    WeeklySummary,
    Login,
}

impl NotificationKind {
    fn column(&self) -> &'static str {
        match self {
            NotificationKind::Assignments => "email_assignments",
            NotificationKind::Meetings => "email_meetings",
            NotificationKind::WeeklySummary => "email_weekly_summary",
            NotificationKind::Login => "email_login_notification",
        }
    }
}

/// Apply a submitted form, keeping the previous value for out-of-range choices.
pub fn apply_form(current: &UserSettings, form: &SettingsForm) -> UserSettings {
    let pick = |value: &str, allowed: &[&str], previous: &str| {
        if allowed.contains(&value) { value.to_string() } else { previous.to_string() }
    };

    UserSettings {
        user_id: current.user_id,
        email_assignments: form.email_assignments.is_some(),
        email_meetings: form.email_meetings.is_some(),
        email_weekly_summary: form.email_weekly_summary.is_some(),
        email_login_notification: form.email_login_notification.is_some(),
        dark_mode: form.dark_mode.is_some(),
        font_size: pick(&form.font_size, FONT_SIZES, &current.font_size),
        preferred_learning_style: pick(
            &form.preferred_learning_style,
            LEARNING_STYLES,
            &current.preferred_learning_style,
        ),
        default_class_level: crate::models::class_level::parse_optional(&form.default_class_level)
            .unwrap_or_else(|_| current.default_class_level.clone()),
        ai_response_length: pick(&form.ai_response_length, RESPONSE_LENGTHS, &current.ai_response_length),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> UserSettings {
        UserSettings {
            user_id: 1,
            email_assignments: true,
            email_meetings: true,
            email_weekly_summary: true,
            email_login_notification: true,
            dark_mode: false,
            font_size: "medium".into(),
            preferred_learning_style: "visual".into(),
            default_class_level: None,
            ai_response_length: "medium".into(),
        }
    }

    #[test]
    fn unticked_boxes_turn_off_and_bad_choices_are_ignored() {
        let form = SettingsForm {
            email_assignments: None,
            email_meetings: Some("on".into()),
            email_weekly_summary: None,
            email_login_notification: None,
            dark_mode: Some("on".into()),
            font_size: "huge".into(),
            preferred_learning_style: "auditory".into(),
            default_class_level: "9".into(),
            ai_response_length: "long".into(),
            csrf_token: String::new(),
        };
        let updated = apply_form(&defaults(), &form);
        assert!(!updated.email_assignments);
        assert!(updated.email_meetings);
        assert!(updated.dark_mode);
        assert_eq!(updated.font_size, "medium");
        assert_eq!(updated.preferred_learning_style, "auditory");
        assert_eq!(updated.default_class_level.as_deref(), Some("9"));
        assert_eq!(updated.ai_response_length, "long");
    }
}
