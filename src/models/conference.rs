use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;

use crate::auth::policy::{ClassScoped, ListScope};

pub const PLATFORMS: &[(&str, &str)] = &[
    ("zoom", "Zoom"),
    ("meet", "Google Meet"),
    ("teams", "Microsoft Teams"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConferenceStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl ConferenceStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => ConferenceStatus::Active,
            "completed" => ConferenceStatus::Completed,
            "cancelled" => ConferenceStatus::Cancelled,
            _ => ConferenceStatus::Scheduled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConferenceStatus::Scheduled => "scheduled",
            ConferenceStatus::Active => "active",
            ConferenceStatus::Completed => "completed",
            ConferenceStatus::Cancelled => "cancelled",
        }
    }
}

/// Status implied by the clock. A cancelled conference stays cancelled.
pub fn derive_status(
    current: ConferenceStatus,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ConferenceStatus {
    if current == ConferenceStatus::Cancelled {
        ConferenceStatus::Cancelled
    } else if now < start {
        ConferenceStatus::Scheduled
    } else if now <= end {
        ConferenceStatus::Active
    } else {
        ConferenceStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingStatus {
    None,
    Waiting,
    Processing,
    Available,
    Failed,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::None => "none",
            RecordingStatus::Waiting => "waiting",
            RecordingStatus::Processing => "processing",
            RecordingStatus::Available => "available",
            RecordingStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Conference {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub class_level: String,
    pub platform: String,
    pub meeting_id: String,
    pub meeting_password: String,
    pub meeting_link: String,
    pub start_url: String,
    pub scheduled_by: i64,
    pub scheduled_by_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub used_oauth: bool,
    pub auto_record: bool,
    pub recording_status: String,
    pub recording_url: String,
    pub recording_s3_key: String,
    pub recording_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ClassScoped for Conference {
    fn class_level(&self) -> &str {
        &self.class_level
    }
    fn owner_id(&self) -> i64 {
        self.scheduled_by
    }
}

impl Conference {
    pub fn class_label(&self) -> String {
        crate::models::class_level::label(&self.class_level)
    }

    pub fn status(&self) -> ConferenceStatus {
        ConferenceStatus::parse(&self.status)
    }

    pub fn is_zoom(&self) -> bool {
        self.platform == "zoom"
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Cloud recording for senior classes or when explicitly requested.
    pub fn wants_cloud_recording(&self) -> bool {
        self.auto_record || crate::models::class_level::is_senior(&self.class_level)
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.end_time >= now && self.status() != ConferenceStatus::Cancelled
    }
}

#[derive(Debug, Deserialize)]
pub struct ConferenceForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub platform: String,
    /// `datetime-local` input, interpreted as UTC.
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub meeting_link: String,
    #[serde(default)]
    pub meeting_password: String,
    #[serde(default)]
    pub auto_record: Option<String>,
    /// Comma-separated user ids; empty means the whole class.
    #[serde(default)]
    pub participants: String,
    pub csrf_token: String,
}

impl ConferenceForm {
    pub fn participant_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .participants
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Invitees resolved against the conference's class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitees {
    pub accepted: Vec<i64>,
    /// Requested ids that are not active students of the class.
    pub rejected: Vec<i64>,
}

/// Only active students of `class_level` may be invited. No selection
/// invites the whole class.
pub async fn resolve_invitees(pool: &PgPool, class_level: &str, requested: &[i64]) -> Result<Invitees, sqlx::Error> {
    let accepted = crate::models::user::class_student_ids(pool, class_level, requested).await?;
    let rejected = requested.iter().copied().filter(|id| !accepted.contains(id)).collect();
    Ok(Invitees { accepted, rejected })
}

/// Parse an HTML `datetime-local` value ("2026-03-01T09:30") as UTC.
pub fn parse_local_datetime(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub struct NewConference {
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub platform: String,
    pub meeting_link: String,
    pub meeting_password: String,
    pub scheduled_by: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub auto_record: bool,
}

/// Provider-side identifiers written back after a successful remote call.
#[derive(Debug, Clone, Default)]
pub struct RemoteMeeting {
    pub meeting_id: String,
    pub join_url: String,
    pub start_url: String,
    pub password: String,
    pub used_oauth: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Participant {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub participant_type: String,
    pub attended: bool,
}

const SELECT_CONFERENCE: &str = "\
    SELECT c.id, c.title, c.description, c.subject_id, s.name AS subject_name, c.class_level, \
           c.platform, c.meeting_id, c.meeting_password, c.meeting_link, c.start_url, c.scheduled_by, \
           COALESCE(NULLIF(u.display_name, ''), u.username) AS scheduled_by_name, \
           c.start_time, c.end_time, c.status, c.used_oauth, c.auto_record, c.recording_status, \
           c.recording_url, c.recording_s3_key, c.recording_processed_at, c.created_at \
    FROM video_conferences c \
    JOIN subjects s ON s.id = c.subject_id \
    JOIN users u ON u.id = c.scheduled_by";

pub async fn find_visible(pool: &PgPool, scope: &ListScope) -> Result<Vec<Conference>, sqlx::Error> {
    sqlx::query_as::<_, Conference>(&format!(
        "{SELECT_CONFERENCE} WHERE {} ORDER BY c.start_time",
        ListScope::predicate("c", "scheduled_by")
    ))
    .bind(scope.mode())
    .bind(scope.class_level())
    .bind(scope.user_id())
    .fetch_all(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Conference>, sqlx::Error> {
    sqlx::query_as::<_, Conference>(&format!("{SELECT_CONFERENCE} WHERE c.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Local classes pointing at any of the given provider meeting ids.
pub async fn find_by_meeting_ids(pool: &PgPool, meeting_ids: &[String]) -> Result<Vec<Conference>, sqlx::Error> {
    sqlx::query_as::<_, Conference>(&format!(
        "{SELECT_CONFERENCE} WHERE c.meeting_id <> '' AND c.meeting_id = ANY($1) ORDER BY c.start_time"
    ))
    .bind(meeting_ids)
    .fetch_all(pool)
    .await
}

pub async fn create(pool: &PgPool, new: &NewConference) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO video_conferences (title, description, subject_id, class_level, platform, meeting_link, \
             meeting_password, scheduled_by, start_time, end_time, auto_record) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(&new.platform)
    .bind(&new.meeting_link)
    .bind(&new.meeting_password)
    .bind(new.scheduled_by)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(new.auto_record)
    .fetch_one(pool)
    .await
}

pub async fn update_details(pool: &PgPool, id: i64, new: &NewConference) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE video_conferences SET title = $1, description = $2, subject_id = $3, class_level = $4, \
             start_time = $5, end_time = $6, auto_record = $7, \
             meeting_link = CASE WHEN platform = 'zoom' AND meeting_id <> '' THEN meeting_link ELSE $8 END, \
             meeting_password = CASE WHEN platform = 'zoom' AND meeting_id <> '' THEN meeting_password ELSE $9 END \
         WHERE id = $10",
    )
    .bind(&new.title)
    .bind(&new.description)
    .bind(new.subject_id)
    .bind(&new.class_level)
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(new.auto_record)
    .bind(&new.meeting_link)
    .bind(&new.meeting_password)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_remote(pool: &PgPool, id: i64, remote: &RemoteMeeting) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE video_conferences SET meeting_id = $1, meeting_link = $2, start_url = $3, \
             meeting_password = $4, used_oauth = $5 \
         WHERE id = $6",
    )
    .bind(&remote.meeting_id)
    .bind(&remote.join_url)
    .bind(&remote.start_url)
    .bind(&remote.password)
    .bind(remote.used_oauth)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_status(pool: &PgPool, id: i64, status: ConferenceStatus) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE video_conferences SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Recompute the clock-derived status, persisting it only when it changed.
pub async fn refresh_status(pool: &PgPool, conf: &mut Conference, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
    let derived = derive_status(conf.status(), conf.start_time, conf.end_time, now);
    if derived != conf.status() {
        set_status(pool, conf.id, derived).await?;
        conf.status = derived.as_str().to_string();
    }
    Ok(())
}

pub async fn set_auto_record(pool: &PgPool, id: i64, enabled: bool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE video_conferences SET auto_record = $1 WHERE id = $2")
        .bind(enabled)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_recording_status(
    pool: &PgPool,
    id: i64,
    status: RecordingStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE video_conferences SET recording_status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_recording_available(
    pool: &PgPool,
    id: i64,
    url: &str,
    s3_key: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE video_conferences SET recording_status = 'available', recording_url = $1, \
             recording_s3_key = $2, recording_processed_at = NOW() \
         WHERE id = $3",
    )
    .bind(url)
    .bind(s3_key)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM video_conferences WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn add_participants(
    pool: &PgPool,
    conference_id: i64,
    user_ids: &[i64],
    participant_type: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO conference_participants (conference_id, user_id, participant_type) \
         SELECT $1, UNNEST($2::bigint[]), $3 \
         ON CONFLICT (conference_id, user_id) DO NOTHING",
    )
    .bind(conference_id)
    .bind(user_ids)
    .bind(participant_type)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn participants(pool: &PgPool, conference_id: i64) -> Result<Vec<Participant>, sqlx::Error> {
    sqlx::query_as::<_, Participant>(
        "SELECT p.user_id, u.username, u.display_name, u.email, p.participant_type, p.attended \
         FROM conference_participants p JOIN users u ON u.id = p.user_id \
         WHERE p.conference_id = $1 ORDER BY p.participant_type, u.username",
    )
    .bind(conference_id)
    .fetch_all(pool)
    .await
}

/// Record attendance, adding the user as a participant if they were not invited.
pub async fn mark_attended(pool: &PgPool, conference_id: i64, user_id: i64, participant_type: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO conference_participants (conference_id, user_id, participant_type, attended, joined_at) \
         VALUES ($1, $2, $3, TRUE, NOW()) \
         ON CONFLICT (conference_id, user_id) DO UPDATE SET attended = TRUE, \
             joined_at = COALESCE(conference_participants.joined_at, NOW())",
    )
    .bind(conference_id)
    .bind(user_id)
    .bind(participant_type)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn count_upcoming_visible(pool: &PgPool, scope: &ListScope) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM video_conferences c WHERE {} AND c.end_time >= NOW() AND c.status <> 'cancelled'",
        ListScope::predicate("c", "scheduled_by")
    ))
    .bind(scope.mode())
    .bind(scope.class_level())
    .bind(scope.user_id())
    .fetch_one(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn status_follows_the_clock() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let end = start + Duration::hours(1);
        let s = ConferenceStatus::Scheduled;

        assert_eq!(derive_status(s, start, end, start - Duration::minutes(1)), ConferenceStatus::Scheduled);
        assert_eq!(derive_status(s, start, end, start), ConferenceStatus::Active);
        assert_eq!(derive_status(s, start, end, end), ConferenceStatus::Active);
        assert_eq!(derive_status(s, start, end, end + Duration::seconds(1)), ConferenceStatus::Completed);
    }

    #[test]
    fn cancelled_is_sticky() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let end = start + Duration::hours(1);
        assert_eq!(
            derive_status(ConferenceStatus::Cancelled, start, end, start + Duration::minutes(5)),
            ConferenceStatus::Cancelled
        );
    }

    #[test]
    fn parses_datetime_local_input() {
        let parsed = parse_local_datetime("2026-03-01T09:30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap());
        assert!(parse_local_datetime("next tuesday").is_none());
    }

    #[test]
    fn participant_ids_skip_garbage_and_repeats() {
        let form = ConferenceForm {
            title: String::new(),
            description: String::new(),
            subject_id: 1,
            class_level: "5".into(),
            platform: "zoom".into(),
            start_time: String::new(),
            end_time: String::new(),
            meeting_link: String::new(),
            meeting_password: String::new(),
            auto_record: None,
            participants: "9, 4, 7,x,,9".into(),
            csrf_token: String::new(),
        };
        assert_eq!(form.participant_ids(), vec![4, 7, 9]);
    }
}
