//! S3 object storage for materials and recordings.

use std::fmt;
use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use crate::config::StorageConfig;

/// Lifetime of generated download links.
pub const PRESIGN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct StorageError(pub String);

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage error: {}", self.0)
    }
}

impl std::error::Error for StorageError {}

#[derive(Clone)]
pub struct Storage {
    client: S3Client,
    bucket: String,
}

impl Storage {
    /// None when no bucket is configured. Credentials come from the usual
    /// AWS provider chain.
    pub async fn from_config(config: &StorageConfig) -> Option<Self> {
        let bucket = config.bucket.clone()?;
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&base).build();
        log::info!("S3 storage enabled for bucket '{bucket}'");
        Some(Self {
            client: S3Client::from_conf(s3_config),
            bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Time-limited GET link for a private object.
    pub async fn presigned_url(&self, key: &str) -> Result<String, StorageError> {
        let presign = PresigningConfig::expires_in(PRESIGN_TTL).map_err(|e| StorageError(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign)
            .await
            .map_err(|e| StorageError(e.to_string()))?;
        Ok(request.uri().to_string())
    }

    pub async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError(e.to_string()))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError(e.to_string()))?;
        Ok(())
    }
}

/// Object key for an imported meeting recording.
pub fn recording_key(conference_id: i64, meeting_id: &str, file_type: &str) -> String {
    let ext = match file_type.trim() {
        "" => "mp4".to_string(),
        t => t.to_ascii_lowercase(),
    };
    format!("recordings/conference_{conference_id}/{meeting_id}.{ext}")
}

/// Object key for a study material file.
pub fn material_key(class_level: &str, file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("materials/class_{class_level}/{safe}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keys_group_by_conference() {
        assert_eq!(recording_key(4, "8812", "MP4"), "recordings/conference_4/8812.mp4");
        assert_eq!(recording_key(4, "8812", ""), "recordings/conference_4/8812.mp4");
        assert_eq!(recording_key(4, "8812", "M4A"), "recordings/conference_4/8812.m4a");
    }

    #[test]
    fn material_keys_are_sanitized() {
        assert_eq!(material_key("10", "My Notes (v2).pdf"), "materials/class_10/My_Notes__v2_.pdf");
    }
}
