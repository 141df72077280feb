use askama::Template;

use super::{PageContext, SubjectOption};
use crate::models::class_level::ClassLevelOption;
use crate::models::recording::Recording;

#[derive(Template)]
#[template(path = "recordings/list.html")]
pub struct RecordingListTemplate {
    pub ctx: PageContext,
    pub recordings: Vec<Recording>,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
    pub q: String,
    pub subject_filter: i64,
    pub class_filter: String,
}

#[derive(Template)]
#[template(path = "recordings/detail.html")]
pub struct RecordingDetailTemplate {
    pub ctx: PageContext,
    pub recording: Recording,
    /// Playable link: the stored URL or a presigned storage URL.
    pub video_url: Option<String>,
    pub can_manage: bool,
}

#[derive(Template)]
#[template(path = "recordings/form.html")]
pub struct RecordingFormTemplate {
    pub ctx: PageContext,
    pub form_action: String,
    pub form_title: String,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
    pub errors: Vec<String>,
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub recording_url: String,
    pub s3_object_key: String,
    pub thumbnail_url: String,
    pub duration_minutes: i32,
    pub recorded_date: String,
    pub storage_enabled: bool,
}
