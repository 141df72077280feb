use askama::Template;

use super::{PageContext, SubjectOption};
use crate::models::class_level::ClassLevelOption;
use crate::models::conference::{Conference, Participant};

#[derive(Template)]
#[template(path = "conferences/list.html")]
pub struct ConferenceListTemplate {
    pub ctx: PageContext,
    pub upcoming: Vec<Conference>,
    pub past: Vec<Conference>,
}

#[derive(Template)]
#[template(path = "conferences/detail.html")]
pub struct ConferenceDetailTemplate {
    pub ctx: PageContext,
    pub conference: Conference,
    pub participants: Vec<Participant>,
    pub can_manage: bool,
    pub recording_id: Option<i64>,
    pub storage_enabled: bool,
    pub zoom_enabled: bool,
}

/// Raw form values, kept as strings so a failed submit can be re-rendered.
#[derive(Default)]
pub struct ConferenceValues {
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub platform: String,
    pub start_time: String,
    pub end_time: String,
    pub meeting_link: String,
    pub meeting_password: String,
    pub auto_record: bool,
}

pub struct InviteeOption {
    pub id: i64,
    pub label: String,
    pub class_level: String,
}

#[derive(Template)]
#[template(path = "conferences/form.html")]
pub struct ConferenceFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub is_edit: bool,
    pub values: ConferenceValues,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
    pub platforms: Vec<(&'static str, &'static str)>,
    pub invitees: Vec<InviteeOption>,
    pub errors: Vec<String>,
    pub zoom_enabled: bool,
}

#[derive(Template)]
#[template(path = "conferences/join.html")]
pub struct ConferenceJoinTemplate {
    pub ctx: PageContext,
    pub conference: Conference,
    pub is_host: bool,
    pub sdk_enabled: bool,
    pub join_url: String,
}

/// One meeting on the connected Zoom account.
pub struct AccountMeetingRow {
    pub meeting_id: String,
    pub topic: String,
    pub starts: String,
    pub duration: i64,
    pub join_url: String,
    pub conference: Option<(i64, String)>,
}

#[derive(Template)]
#[template(path = "conferences/zoom_meetings.html")]
pub struct ZoomMeetingsTemplate {
    pub ctx: PageContext,
    pub meetings: Vec<AccountMeetingRow>,
    pub error: Option<String>,
    pub has_token: bool,
}
