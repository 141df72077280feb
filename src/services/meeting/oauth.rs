use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;

use super::zoom::{ZoomAuth, ZoomClient};
use super::{AccountMeeting, CreatedMeeting, MeetingApi, MeetingError, MeetingRequest, RecordingFile};
use crate::config::ZoomConfig;
use crate::models::oauth_token::{self, OAuthToken};

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: String,
}

impl TokenResponse {
    /// Stored form for `user_id`. A refresh response without a new refresh
    /// token keeps `previous_refresh`.
    pub fn into_stored(self, user_id: i64, previous_refresh: &str) -> OAuthToken {
        let now = Utc::now();
        OAuthToken {
            user_id,
            access_token: self.access_token,
            refresh_token: if self.refresh_token.is_empty() {
                previous_refresh.to_string()
            } else {
                self.refresh_token
            },
            token_type: if self.token_type.is_empty() { "bearer".to_string() } else { self.token_type },
            expires_at: oauth_token::expires_at(now, self.expires_in),
            scope: self.scope,
        }
    }
}

/// Authorization-code flow against the provider's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct ZoomOAuth {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    oauth_base: String,
}

impl ZoomOAuth {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str, oauth_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ZoomConfig) -> Option<Self> {
        Some(Self::new(
            config.client_id.as_deref()?,
            config.client_secret.as_deref()?,
            config.redirect_uri.as_deref()?,
            &config.oauth_base,
        ))
    }

    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&state={}",
            self.oauth_base,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state),
        )
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, MeetingError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, MeetingError> {
        self.token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, MeetingError> {
        let response = self
            .client
            .post(format!("{}/token", self.oauth_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| MeetingError::Network(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| MeetingError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(MeetingError::Auth(format!("HTTP {status}: {body}")));
        }
        serde_json::from_str(&body).map_err(|e| MeetingError::Parse(e.to_string()))
    }
}

/// Yields a usable access token for a local user.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self, user_id: i64) -> Result<String, MeetingError>;
}

/// Tokens stored in `oauth_tokens`, refreshed once when expired.
pub struct PgTokenSource {
    pool: PgPool,
    oauth: ZoomOAuth,
}

impl PgTokenSource {
    pub fn new(pool: PgPool, oauth: ZoomOAuth) -> Self {
        Self { pool, oauth }
    }
}

#[async_trait]
impl TokenSource for PgTokenSource {
    async fn access_token(&self, user_id: i64) -> Result<String, MeetingError> {
        let token = oauth_token::find_for_user(&self.pool, user_id)
            .await?
            .ok_or(MeetingError::NoToken)?;

        if !token.is_expired(Utc::now()) {
            return Ok(token.access_token);
        }
        if token.refresh_token.is_empty() {
            return Err(MeetingError::Auth("Token expired and no refresh token stored".to_string()));
        }

        let refreshed = self.oauth.refresh(&token.refresh_token).await?;
        let stored = refreshed.into_stored(user_id, &token.refresh_token);
        oauth_token::save(&self.pool, &stored).await?;
        log::info!("Refreshed Zoom token for user {user_id}");
        Ok(stored.access_token)
    }
}

/// Per-user OAuth path.
pub struct OAuthMeetingApi {
    client: ZoomClient,
    tokens: Arc<dyn TokenSource>,
}

impl OAuthMeetingApi {
    pub fn new(client: ZoomClient, tokens: Arc<dyn TokenSource>) -> Self {
        Self { client, tokens }
    }

    async fn auth(&self, host_id: i64) -> Result<ZoomAuth, MeetingError> {
        Ok(ZoomAuth::Bearer(self.tokens.access_token(host_id).await?))
    }
}

#[async_trait]
impl MeetingApi for OAuthMeetingApi {
    fn name(&self) -> &'static str {
        "zoom-oauth"
    }

    async fn create(&self, host_id: i64, req: &MeetingRequest) -> Result<CreatedMeeting, MeetingError> {
        let auth = self.auth(host_id).await?;
        self.client.create_meeting(&auth, req).await
    }

    async fn update(&self, host_id: i64, meeting_id: &str, req: &MeetingRequest) -> Result<(), MeetingError> {
        let auth = self.auth(host_id).await?;
        self.client.update_meeting(&auth, meeting_id, req).await
    }

    async fn delete(&self, host_id: i64, meeting_id: &str) -> Result<(), MeetingError> {
        let auth = self.auth(host_id).await?;
        self.client.delete_meeting(&auth, meeting_id).await
    }

    async fn recordings(&self, host_id: i64, meeting_id: &str) -> Result<Vec<RecordingFile>, MeetingError> {
        let auth = self.auth(host_id).await?;
        self.client.meeting_recordings(&auth, meeting_id).await
    }

    async fn download(&self, host_id: i64, url: &str) -> Result<Vec<u8>, MeetingError> {
        let auth = self.auth(host_id).await?;
        self.client.download(&auth, url).await
    }
}

/// The connected account of one staff member, browsed directly rather than
/// through a conference. Only the OAuth path can see a user's own meetings.
#[derive(Clone)]
pub struct AccountMeetings {
    client: ZoomClient,
    tokens: Arc<dyn TokenSource>,
}

impl AccountMeetings {
    pub fn new(client: ZoomClient, tokens: Arc<dyn TokenSource>) -> Self {
        Self { client, tokens }
    }

    pub fn from_config(config: &ZoomConfig, pool: &PgPool) -> Option<Self> {
        let oauth = ZoomOAuth::from_config(config)?;
        let tokens = Arc::new(PgTokenSource::new(pool.clone(), oauth));
        Some(Self::new(ZoomClient::new(&config.api_base), tokens))
    }

    pub async fn upcoming(&self, user_id: i64) -> Result<Vec<AccountMeeting>, MeetingError> {
        let auth = ZoomAuth::Bearer(self.tokens.access_token(user_id).await?);
        self.client.list_meetings(&auth).await
    }

    pub async fn delete(&self, user_id: i64, meeting_id: &str) -> Result<(), MeetingError> {
        let auth = ZoomAuth::Bearer(self.tokens.access_token(user_id).await?);
        self.client.delete_meeting(&auth, meeting_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_encodes_redirect() {
        let oauth = ZoomOAuth::new("cid", "secret", "http://localhost:8080/zoom/oauth/callback", "https://zoom.us/oauth");
        let url = oauth.authorize_url("abc123");
        assert!(url.starts_with("https://zoom.us/oauth/authorize?response_type=code&client_id=cid"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fzoom%2Foauth%2Fcallback"));
        assert!(url.ends_with("state=abc123"));
    }

    #[test]
    fn refresh_without_new_refresh_token_keeps_old_one() {
        let response = TokenResponse {
            access_token: "new-access".to_string(),
            refresh_token: String::new(),
            token_type: String::new(),
            expires_in: Some(60),
            scope: "meeting:write".to_string(),
        };
        let stored = response.into_stored(5, "old-refresh");
        assert_eq!(stored.refresh_token, "old-refresh");
        assert_eq!(stored.token_type, "bearer");
        assert!(!stored.is_expired(Utc::now()));
    }

    struct FixedToken;

    #[async_trait]
    impl TokenSource for FixedToken {
        async fn access_token(&self, user_id: i64) -> Result<String, MeetingError> {
            if user_id == 7 { Ok("seven".to_string()) } else { Err(MeetingError::NoToken) }
        }
    }

    #[tokio::test]
    async fn account_meetings_use_the_owner_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/meetings/81234567890")
            .match_header("authorization", "Bearer seven")
            .with_status(204)
            .create_async()
            .await;

        let account = AccountMeetings::new(ZoomClient::new(&server.url()), Arc::new(FixedToken));
        account.delete(7, "81234567890").await.unwrap();
        mock.assert_async().await;

        let err = account.upcoming(8).await.unwrap_err();
        assert!(matches!(err, MeetingError::NoToken));
    }

    #[tokio::test]
    async fn exchange_code_uses_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        // base64("cid:secret")
        let mock = server
            .mock("POST", "/token")
            .match_header("authorization", "Basic Y2lkOnNlY3JldA==")
            .match_body(mockito::Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()))
            .with_status(200)
            .with_body(r#"{"access_token":"at","refresh_token":"rt","token_type":"bearer","expires_in":3599,"scope":"meeting:write"}"#)
            .create_async()
            .await;

        let oauth = ZoomOAuth::new("cid", "secret", "http://localhost/cb", &server.url());
        let token = oauth.exchange_code("the-code").await.unwrap();
        mock.assert_async().await;
        assert_eq!(token.access_token, "at");
        assert_eq!(token.expires_in, Some(3599));
    }
}
