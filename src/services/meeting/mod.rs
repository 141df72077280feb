//! Remote meeting management: a Zoom REST client reached through either a
//! user's OAuth token or the server JWT credential, with the OAuth path
//! falling back to the server path.

mod lifecycle;
mod oauth;
pub mod recordings;
mod zoom;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use lifecycle::{MeetingFailure, MeetingLifecycle, Synced};
pub use oauth::{AccountMeetings, OAuthMeetingApi, PgTokenSource, TokenResponse, TokenSource, ZoomOAuth};
pub use zoom::{JwtMeetingApi, ZoomAuth, ZoomClient, meeting_payload, sdk_signature, server_jwt};

#[derive(Debug, Clone)]
pub enum MeetingError {
    NotConfigured(&'static str),
    NoToken,
    Auth(String),
    Http { status: u16, body: String },
    Network(String),
    Parse(String),
    Db(String),
}

impl fmt::Display for MeetingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeetingError::NotConfigured(what) => write!(f, "{what} is not configured"),
            MeetingError::NoToken => write!(f, "No Zoom account connected"),
            MeetingError::Auth(msg) => write!(f, "Authorization failed: {msg}"),
            MeetingError::Http { status, body } => write!(f, "Zoom API returned {status}: {body}"),
            MeetingError::Network(msg) => write!(f, "Zoom API unreachable: {msg}"),
            MeetingError::Parse(msg) => write!(f, "Unexpected Zoom response: {msg}"),
            MeetingError::Db(msg) => write!(f, "Token storage error: {msg}"),
        }
    }
}

impl std::error::Error for MeetingError {}

impl From<sqlx::Error> for MeetingError {
    fn from(e: sqlx::Error) -> Self {
        MeetingError::Db(e.to_string())
    }
}

/// What the app asks the provider to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequest {
    pub topic: String,
    pub agenda: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub password: Option<String>,
    pub cloud_recording: bool,
}

impl MeetingRequest {
    pub fn for_conference(
        title: &str,
        description: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        password: &str,
        class_level: &str,
        auto_record: bool,
    ) -> Self {
        Self {
            topic: title.to_string(),
            agenda: description.to_string(),
            start_time,
            duration_minutes: (end_time - start_time).num_minutes().max(1),
            password: Some(password.to_string()).filter(|p| !p.is_empty()),
            cloud_recording: auto_record || crate::models::class_level::is_senior(class_level),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedMeeting {
    pub id: String,
    pub join_url: String,
    pub start_url: String,
    pub password: String,
}

/// A meeting as listed on the provider account, whether or not a local
/// conference points at it.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountMeeting {
    pub id: serde_json::Value,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub join_url: String,
}

impl AccountMeeting {
    pub fn id(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordingFile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub download_url: String,
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub recording_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recording_end: Option<DateTime<Utc>>,
}

impl RecordingFile {
    pub fn is_video(&self) -> bool {
        self.file_type.eq_ignore_ascii_case("mp4")
    }

    pub fn duration_minutes(&self) -> i32 {
        match (self.recording_start, self.recording_end) {
            (Some(s), Some(e)) => (e - s).num_minutes().max(0) as i32,
            _ => 0,
        }
    }
}

/// A provider API reached with one kind of credential. `host_id` is the
/// local user the meeting belongs to.
#[async_trait]
pub trait MeetingApi: Send + Sync {
    fn name(&self) -> &'static str;
    async fn create(&self, host_id: i64, req: &MeetingRequest) -> Result<CreatedMeeting, MeetingError>;
    async fn update(&self, host_id: i64, meeting_id: &str, req: &MeetingRequest) -> Result<(), MeetingError>;
    async fn delete(&self, host_id: i64, meeting_id: &str) -> Result<(), MeetingError>;
    async fn recordings(&self, host_id: i64, meeting_id: &str) -> Result<Vec<RecordingFile>, MeetingError>;
    async fn download(&self, host_id: i64, url: &str) -> Result<Vec<u8>, MeetingError>;
}
