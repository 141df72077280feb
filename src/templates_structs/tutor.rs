use askama::Template;

use super::{PageContext, SubjectOption};
use crate::models::tutor::{TutorMessage, TutorSession};

#[derive(Template)]
#[template(path = "tutor/chat.html")]
pub struct TutorTemplate {
    pub ctx: PageContext,
    pub session: Option<TutorSession>,
    pub messages: Vec<TutorMessage>,
    pub subjects: Vec<SubjectOption>,
    pub ai_enabled: bool,
}

#[derive(Template)]
#[template(path = "tutor/history.html")]
pub struct TutorHistoryTemplate {
    pub ctx: PageContext,
    pub sessions: Vec<TutorSession>,
}

#[derive(Template)]
#[template(path = "tutor/session.html")]
pub struct TutorSessionTemplate {
    pub ctx: PageContext,
    pub session: TutorSession,
    pub messages: Vec<TutorMessage>,
}
