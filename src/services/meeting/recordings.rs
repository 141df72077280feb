//! Copy a finished meeting's cloud recordings into object storage and list
//! them as recorded sessions.

use std::fmt;

use sqlx::PgPool;

use super::{MeetingFailure, MeetingLifecycle};
use crate::models::conference::{self, Conference, RecordingStatus};
use crate::models::recording::{self, NewRecording, StorageType};
use crate::services::storage::{self, Storage};

#[derive(Debug)]
pub enum ImportError {
    NotZoomMeeting,
    StorageNotConfigured,
    NoRecordings,
    Provider(MeetingFailure),
    Db(sqlx::Error),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::NotZoomMeeting => write!(f, "This conference has no Zoom meeting"),
            ImportError::StorageNotConfigured => write!(f, "Recording storage is not configured"),
            ImportError::NoRecordings => write!(f, "No video recordings are available yet"),
            ImportError::Provider(e) => write!(f, "Could not fetch recordings: {e}"),
            ImportError::Db(e) => write!(f, "Database error: {e}"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<sqlx::Error> for ImportError {
    fn from(e: sqlx::Error) -> Self {
        ImportError::Db(e)
    }
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub recording_ids: Vec<i64>,
    pub failed: usize,
}

/// Status moves `processing -> available` when at least one file was stored,
/// `failed` when every file failed, and `waiting` when the provider has
/// nothing to hand over yet.
pub async fn import(
    pool: &PgPool,
    meetings: &MeetingLifecycle,
    storage: Option<&Storage>,
    conf: &Conference,
    imported_by: i64,
) -> Result<ImportOutcome, ImportError> {
    if !conf.is_zoom() || conf.meeting_id.is_empty() {
        return Err(ImportError::NotZoomMeeting);
    }
    let storage = storage.ok_or(ImportError::StorageNotConfigured)?;

    conference::set_recording_status(pool, conf.id, RecordingStatus::Processing).await?;

    let files = match meetings.recordings(conf.scheduled_by, &conf.meeting_id, conf.used_oauth).await {
        Ok(synced) => synced.value,
        Err(failure) => {
            conference::set_recording_status(pool, conf.id, RecordingStatus::Failed).await?;
            return Err(ImportError::Provider(failure));
        }
    };

    let videos: Vec<_> = files.into_iter().filter(|f| f.is_video() && !f.download_url.is_empty()).collect();
    if videos.is_empty() {
        conference::set_recording_status(pool, conf.id, RecordingStatus::Waiting).await?;
        return Err(ImportError::NoRecordings);
    }

    let mut outcome = ImportOutcome::default();
    let mut last_key = None;

    for (index, file) in videos.iter().enumerate() {
        let data = match meetings.download(conf.scheduled_by, &file.download_url, conf.used_oauth).await {
            Ok(synced) => synced.value,
            Err(failure) => {
                log::error!("Recording download for conference {} failed: {failure}", conf.id);
                outcome.failed += 1;
                continue;
            }
        };

        let file_id = if file.id.is_empty() { index.to_string() } else { file.id.clone() };
        let key = storage::recording_key(conf.id, &format!("{}_{file_id}", conf.meeting_id), &file.file_type);
        let size_mb = data.len() as f64 / (1024.0 * 1024.0);

        if let Err(e) = storage.put(&key, data, "video/mp4").await {
            log::error!("Recording upload for conference {} failed: {e}", conf.id);
            outcome.failed += 1;
            continue;
        }

        let title = if videos.len() > 1 {
            format!("{} (part {})", conf.title, index + 1)
        } else {
            conf.title.clone()
        };
        let id = recording::create(
            pool,
            &NewRecording {
                title,
                description: conf.description.clone(),
                subject_id: conf.subject_id,
                class_level: conf.class_level.clone(),
                recording_url: String::new(),
                thumbnail_url: String::new(),
                uploaded_by: imported_by,
                duration_minutes: file.duration_minutes(),
                recorded_date: file.recording_start.unwrap_or(conf.start_time),
                storage_type: StorageType::S3,
                s3_object_key: key.clone(),
                file_size_mb: size_mb,
                conference_id: Some(conf.id),
            },
        )
        .await?;

        log::info!("Imported recording {id} for conference {} into {key}", conf.id);
        outcome.recording_ids.push(id);
        last_key = Some(key);
    }

    match (outcome.recording_ids.first(), last_key) {
        (Some(first), Some(key)) => {
            conference::set_recording_available(pool, conf.id, &format!("/recordings/{first}"), &key).await?;
        }
        _ => {
            conference::set_recording_status(pool, conf.id, RecordingStatus::Failed).await?;
        }
    }

    Ok(outcome)
}
