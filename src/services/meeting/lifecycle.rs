use std::sync::Arc;

use sqlx::PgPool;

use super::oauth::{OAuthMeetingApi, PgTokenSource, ZoomOAuth};
use super::zoom::{JwtMeetingApi, ZoomClient};
use super::{CreatedMeeting, MeetingApi, MeetingError, MeetingRequest, RecordingFile};
use crate::config::ZoomConfig;

/// A remote call that went through, and whether the OAuth path carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
    pub value: T,
    pub used_oauth: bool,
}

/// Every path that was tried, in order, with its error.
#[derive(Debug, Clone)]
pub struct MeetingFailure {
    pub attempts: Vec<(&'static str, MeetingError)>,
}

impl MeetingFailure {
    pub fn message(&self) -> String {
        if self.attempts.is_empty() {
            return "Zoom is not configured".to_string();
        }
        self.attempts
            .iter()
            .map(|(path, e)| format!("{path}: {e}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl std::fmt::Display for MeetingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// OAuth first, then the server credential. Each path is tried at most once
/// per operation.
#[derive(Clone, Default)]
pub struct MeetingLifecycle {
    oauth: Option<Arc<dyn MeetingApi>>,
    server: Option<Arc<dyn MeetingApi>>,
}

impl MeetingLifecycle {
    pub fn new(oauth: Option<Arc<dyn MeetingApi>>, server: Option<Arc<dyn MeetingApi>>) -> Self {
        Self { oauth, server }
    }

    pub fn from_config(config: &ZoomConfig, pool: &PgPool) -> Self {
        let oauth = ZoomOAuth::from_config(config).map(|oauth| {
            let tokens = Arc::new(PgTokenSource::new(pool.clone(), oauth));
            Arc::new(OAuthMeetingApi::new(ZoomClient::new(&config.api_base), tokens)) as Arc<dyn MeetingApi>
        });
        let server = JwtMeetingApi::from_config(config).map(|api| Arc::new(api) as Arc<dyn MeetingApi>);

        if oauth.is_none() && server.is_none() {
            log::warn!("Zoom credentials not configured; meetings will use manual links");
        }
        Self { oauth, server }
    }

    pub fn is_configured(&self) -> bool {
        self.oauth.is_some() || self.server.is_some()
    }

    pub fn oauth_enabled(&self) -> bool {
        self.oauth.is_some()
    }

    pub async fn create(&self, host_id: i64, req: &MeetingRequest) -> Result<Synced<CreatedMeeting>, MeetingFailure> {
        self.run("create", true, |api| {
            let req = req.clone();
            async move { api.create(host_id, &req).await }
        })
        .await
    }

    /// `prefer_oauth` should be whether the meeting was created through OAuth.
    pub async fn update(
        &self,
        host_id: i64,
        meeting_id: &str,
        req: &MeetingRequest,
        prefer_oauth: bool,
    ) -> Result<Synced<()>, MeetingFailure> {
        self.run("update", prefer_oauth, |api| {
            let req = req.clone();
            let id = meeting_id.to_string();
            async move { api.update(host_id, &id, &req).await }
        })
        .await
    }

    pub async fn delete(&self, host_id: i64, meeting_id: &str, prefer_oauth: bool) -> Result<Synced<()>, MeetingFailure> {
        self.run("delete", prefer_oauth, |api| {
            let id = meeting_id.to_string();
            async move { api.delete(host_id, &id).await }
        })
        .await
    }

    pub async fn recordings(
        &self,
        host_id: i64,
        meeting_id: &str,
        prefer_oauth: bool,
    ) -> Result<Synced<Vec<RecordingFile>>, MeetingFailure> {
        self.run("recordings", prefer_oauth, |api| {
            let id = meeting_id.to_string();
            async move { api.recordings(host_id, &id).await }
        })
        .await
    }

    pub async fn download(&self, host_id: i64, url: &str, prefer_oauth: bool) -> Result<Synced<Vec<u8>>, MeetingFailure> {
        self.run("download", prefer_oauth, |api| {
            let url = url.to_string();
            async move { api.download(host_id, &url).await }
        })
        .await
    }

    async fn run<T, F, Fut>(&self, op: &str, use_oauth: bool, call: F) -> Result<Synced<T>, MeetingFailure>
    where
        F: Fn(Arc<dyn MeetingApi>) -> Fut,
        Fut: std::future::Future<Output = Result<T, MeetingError>>,
    {
        let mut attempts = Vec::new();

        if use_oauth {
            if let Some(api) = &self.oauth {
                match call(api.clone()).await {
                    Ok(value) => {
                        log::info!("Zoom {op} succeeded via {}", api.name());
                        return Ok(Synced { value, used_oauth: true });
                    }
                    Err(e) => {
                        log::warn!("Zoom {op} via {} failed, falling back: {e}", api.name());
                        attempts.push((api.name(), e));
                    }
                }
            }
        }

        match &self.server {
            Some(api) => match call(api.clone()).await {
                Ok(value) => {
                    log::info!("Zoom {op} succeeded via {}", api.name());
                    Ok(Synced { value, used_oauth: false })
                }
                Err(e) => {
                    log::error!("Zoom {op} via {} failed: {e}", api.name());
                    attempts.push((api.name(), e));
                    Err(MeetingFailure { attempts })
                }
            },
            None => {
                attempts.push(("zoom-jwt", MeetingError::NotConfigured("Zoom server credential")));
                Err(MeetingFailure { attempts })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fake {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Fake {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self { name, fail, calls: AtomicUsize::new(0) })
        }

        fn result<T>(&self, value: T) -> Result<T, MeetingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(MeetingError::Http { status: 401, body: "invalid token".to_string() })
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl MeetingApi for Fake {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn create(&self, _: i64, _: &MeetingRequest) -> Result<CreatedMeeting, MeetingError> {
            self.result(CreatedMeeting { id: self.name.to_string(), ..Default::default() })
        }
        async fn update(&self, _: i64, _: &str, _: &MeetingRequest) -> Result<(), MeetingError> {
            self.result(())
        }
        async fn delete(&self, _: i64, _: &str) -> Result<(), MeetingError> {
            self.result(())
        }
        async fn recordings(&self, _: i64, _: &str) -> Result<Vec<RecordingFile>, MeetingError> {
            self.result(Vec::new())
        }
        async fn download(&self, _: i64, _: &str) -> Result<Vec<u8>, MeetingError> {
            self.result(Vec::new())
        }
    }

    fn request() -> MeetingRequest {
        MeetingRequest {
            topic: "Physics".to_string(),
            agenda: String::new(),
            start_time: Utc::now(),
            duration_minutes: 60,
            password: None,
            cloud_recording: false,
        }
    }

    #[tokio::test]
    async fn oauth_success_skips_fallback() {
        let oauth = Fake::new("oauth", false);
        let server = Fake::new("server", false);
        let lifecycle = MeetingLifecycle::new(Some(oauth.clone()), Some(server.clone()));

        let synced = lifecycle.create(1, &request()).await.unwrap();
        assert!(synced.used_oauth);
        assert_eq!(synced.value.id, "oauth");
        assert_eq!(server.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oauth_failure_tries_fallback_exactly_once() {
        let oauth = Fake::new("oauth", true);
        let server = Fake::new("server", false);
        let lifecycle = MeetingLifecycle::new(Some(oauth.clone()), Some(server.clone()));

        let synced = lifecycle.create(1, &request()).await.unwrap();
        assert!(!synced.used_oauth);
        assert_eq!(oauth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn both_paths_failing_surfaces_both_errors() {
        let oauth = Fake::new("oauth", true);
        let server = Fake::new("server", true);
        let lifecycle = MeetingLifecycle::new(Some(oauth.clone()), Some(server.clone()));

        let failure = lifecycle.create(1, &request()).await.unwrap_err();
        assert_eq!(failure.attempts.len(), 2);
        assert_eq!(oauth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.calls.load(Ordering::SeqCst), 1);
        assert!(failure.message().starts_with("oauth: "));
    }

    #[tokio::test]
    async fn update_of_jwt_meeting_skips_oauth() {
        let oauth = Fake::new("oauth", false);
        let server = Fake::new("server", false);
        let lifecycle = MeetingLifecycle::new(Some(oauth.clone()), Some(server.clone()));

        let synced = lifecycle.update(1, "123", &request(), false).await.unwrap();
        assert!(!synced.used_oauth);
        assert_eq!(oauth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_lifecycle_fails_without_calls() {
        let lifecycle = MeetingLifecycle::default();
        assert!(!lifecycle.is_configured());
        let failure = lifecycle.delete(1, "123", true).await.unwrap_err();
        assert!(matches!(failure.attempts[0].1, MeetingError::NotConfigured(_)));
    }
}
