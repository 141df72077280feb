use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{AccountMeeting, CreatedMeeting, MeetingApi, MeetingError, MeetingRequest, RecordingFile};
use crate::config::ZoomConfig;

/// How a request is authorized against the REST API.
#[derive(Debug, Clone)]
pub enum ZoomAuth {
    /// HS256 token signed with the server API secret.
    Jwt { api_key: String, api_secret: String },
    /// A user's OAuth access token.
    Bearer(String),
}

impl ZoomAuth {
    fn header_value(&self, now: DateTime<Utc>) -> Result<String, MeetingError> {
        match self {
            ZoomAuth::Jwt { api_key, api_secret } => Ok(format!("Bearer {}", server_jwt(api_key, api_secret, now)?)),
            ZoomAuth::Bearer(token) => Ok(format!("Bearer {token}")),
        }
    }
}

#[derive(Serialize)]
struct ServerClaims<'a> {
    iss: &'a str,
    exp: i64,
}

/// One-hour server token for the JWT path.
pub fn server_jwt(api_key: &str, api_secret: &str, now: DateTime<Utc>) -> Result<String, MeetingError> {
    let claims = ServerClaims { iss: api_key, exp: now.timestamp() + 3600 };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(api_secret.as_bytes()))
        .map_err(|e| MeetingError::Auth(e.to_string()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SdkClaims<'a> {
    sdk_key: &'a str,
    mn: &'a str,
    role: u8,
    iat: i64,
    exp: i64,
    token_exp: i64,
}

/// Meeting SDK join signature. `role` is 0 for attendees and 1 for the host.
/// Valid for two hours, backdated 30 s for clock skew.
pub fn sdk_signature(
    sdk_key: &str,
    sdk_secret: &str,
    meeting_number: &str,
    role: u8,
    now: DateTime<Utc>,
) -> Result<String, MeetingError> {
    let iat = now.timestamp() - 30;
    let exp = iat + 2 * 3600;
    let claims = SdkClaims { sdk_key, mn: meeting_number, role, iat, exp, token_exp: exp };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(sdk_secret.as_bytes()))
        .map_err(|e| MeetingError::Auth(e.to_string()))
}

/// Request body for create and update: classroom defaults plus optional
/// cloud recording.
pub fn meeting_payload(req: &MeetingRequest) -> Value {
    let mut body = json!({
        "topic": req.topic,
        "type": 2,
        "start_time": req.start_time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "duration": req.duration_minutes,
        "timezone": "UTC",
        "agenda": req.agenda,
        "settings": {
            "host_video": true,
            "participant_video": true,
            "join_before_host": false,
            "mute_upon_entry": true,
            "waiting_room": true,
            "meeting_authentication": false,
            "auto_recording": if req.cloud_recording { "cloud" } else { "none" },
        }
    });
    if let Some(password) = &req.password {
        body["password"] = json!(password);
    }
    body
}

#[derive(Deserialize)]
struct CreateResponse {
    id: Value,
    #[serde(default)]
    join_url: String,
    #[serde(default)]
    start_url: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct RecordingsResponse {
    #[serde(default)]
    recording_files: Vec<RecordingFile>,
}

#[derive(Deserialize)]
struct MeetingListResponse {
    #[serde(default)]
    meetings: Vec<AccountMeeting>,
}

/// Thin REST client; the credential is supplied per call.
#[derive(Debug, Clone)]
pub struct ZoomClient {
    client: reqwest::Client,
    base_url: String,
}

impl ZoomClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn send(
        &self,
        auth: &ZoomAuth,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
        expected: u16,
    ) -> Result<String, MeetingError> {
        let mut request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", auth.header_value(Utc::now())?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| MeetingError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| MeetingError::Network(e.to_string()))?;
        if status != expected {
            return Err(MeetingError::Http { status, body: text });
        }
        Ok(text)
    }

    pub async fn create_meeting(&self, auth: &ZoomAuth, req: &MeetingRequest) -> Result<CreatedMeeting, MeetingError> {
        let text = self
            .send(auth, reqwest::Method::POST, "/users/me/meetings", Some(&meeting_payload(req)), 201)
            .await?;
        let created: CreateResponse = serde_json::from_str(&text).map_err(|e| MeetingError::Parse(e.to_string()))?;
        let id = match created.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(CreatedMeeting {
            id,
            join_url: created.join_url,
            start_url: created.start_url,
            password: created.password,
        })
    }

    pub async fn update_meeting(&self, auth: &ZoomAuth, meeting_id: &str, req: &MeetingRequest) -> Result<(), MeetingError> {
        let path = format!("/meetings/{}", urlencoding::encode(meeting_id));
        self.send(auth, reqwest::Method::PATCH, &path, Some(&meeting_payload(req)), 204)
            .await
            .map(|_| ())
    }

    pub async fn delete_meeting(&self, auth: &ZoomAuth, meeting_id: &str) -> Result<(), MeetingError> {
        let path = format!("/meetings/{}", urlencoding::encode(meeting_id));
        self.send(auth, reqwest::Method::DELETE, &path, None, 204).await.map(|_| ())
    }

    /// Upcoming scheduled meetings of the account behind `auth`.
    pub async fn list_meetings(&self, auth: &ZoomAuth) -> Result<Vec<AccountMeeting>, MeetingError> {
        let text = self
            .send(auth, reqwest::Method::GET, "/users/me/meetings?type=upcoming&page_size=100", None, 200)
            .await?;
        let parsed: MeetingListResponse = serde_json::from_str(&text).map_err(|e| MeetingError::Parse(e.to_string()))?;
        Ok(parsed.meetings)
    }

    pub async fn meeting_recordings(&self, auth: &ZoomAuth, meeting_id: &str) -> Result<Vec<RecordingFile>, MeetingError> {
        let path = format!("/meetings/{}/recordings", urlencoding::encode(meeting_id));
        let text = self.send(auth, reqwest::Method::GET, &path, None, 200).await?;
        let parsed: RecordingsResponse = serde_json::from_str(&text).map_err(|e| MeetingError::Parse(e.to_string()))?;
        Ok(parsed.recording_files)
    }

    pub async fn download(&self, auth: &ZoomAuth, url: &str) -> Result<Vec<u8>, MeetingError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", auth.header_value(Utc::now())?)
            .send()
            .await
            .map_err(|e| MeetingError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MeetingError::Http { status: status.as_u16(), body });
        }
        let bytes = response.bytes().await.map_err(|e| MeetingError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Server-credential path.
#[derive(Debug, Clone)]
pub struct JwtMeetingApi {
    client: ZoomClient,
    auth: ZoomAuth,
}

impl JwtMeetingApi {
    pub fn new(client: ZoomClient, api_key: &str, api_secret: &str) -> Self {
        Self {
            client,
            auth: ZoomAuth::Jwt { api_key: api_key.to_string(), api_secret: api_secret.to_string() },
        }
    }

    pub fn from_config(config: &ZoomConfig) -> Option<Self> {
        let key = config.api_key.as_deref()?;
        let secret = config.api_secret.as_deref()?;
        Some(Self::new(ZoomClient::new(&config.api_base), key, secret))
    }
}

#[async_trait]
impl MeetingApi for JwtMeetingApi {
    fn name(&self) -> &'static str {
        "zoom-jwt"
    }

    async fn create(&self, _host_id: i64, req: &MeetingRequest) -> Result<CreatedMeeting, MeetingError> {
        self.client.create_meeting(&self.auth, req).await
    }

    async fn update(&self, _host_id: i64, meeting_id: &str, req: &MeetingRequest) -> Result<(), MeetingError> {
        self.client.update_meeting(&self.auth, meeting_id, req).await
    }

    async fn delete(&self, _host_id: i64, meeting_id: &str) -> Result<(), MeetingError> {
        self.client.delete_meeting(&self.auth, meeting_id).await
    }

    async fn recordings(&self, _host_id: i64, meeting_id: &str) -> Result<Vec<RecordingFile>, MeetingError> {
        self.client.meeting_recordings(&self.auth, meeting_id).await
    }

    async fn download(&self, _host_id: i64, url: &str) -> Result<Vec<u8>, MeetingError> {
        self.client.download(&self.auth, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn request(cloud: bool) -> MeetingRequest {
        MeetingRequest {
            topic: "Algebra".to_string(),
            agenda: "Linear equations".to_string(),
            start_time: Utc.with_ymd_and_hms(2030, 1, 5, 10, 0, 0).unwrap(),
            duration_minutes: 45,
            password: None,
            cloud_recording: cloud,
        }
    }

    #[test]
    fn payload_has_classroom_settings() {
        let body = meeting_payload(&request(false));
        assert_eq!(body["type"], 2);
        assert_eq!(body["start_time"], "2030-01-05T10:00:00Z");
        assert_eq!(body["settings"]["waiting_room"], true);
        assert_eq!(body["settings"]["join_before_host"], false);
        assert_eq!(body["settings"]["auto_recording"], "none");
        assert!(body.get("password").is_none());
    }

    #[test]
    fn payload_requests_cloud_recording() {
        let body = meeting_payload(&request(true));
        assert_eq!(body["settings"]["auto_recording"], "cloud");
    }

    #[test]
    fn sdk_signature_carries_meeting_and_role() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Claims {
            sdk_key: String,
            mn: String,
            role: u8,
            iat: i64,
            token_exp: i64,
        }

        let now = Utc::now();
        let token = sdk_signature("key", "secret", "98765", 1, now).unwrap();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(decoded.claims.sdk_key, "key");
        assert_eq!(decoded.claims.mn, "98765");
        assert_eq!(decoded.claims.role, 1);
        assert_eq!(decoded.claims.token_exp - decoded.claims.iat, 7200);
    }

    #[tokio::test]
    async fn create_meeting_reads_numeric_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/users/me/meetings")
            .match_header("authorization", "Bearer user-token")
            .with_status(201)
            .with_body(r#"{"id": 81234567890, "join_url": "https://zoom.us/j/81234567890", "start_url": "https://zoom.us/s/1", "password": "abc"}"#)
            .create_async()
            .await;

        let client = ZoomClient::new(&server.url());
        let created = client
            .create_meeting(&ZoomAuth::Bearer("user-token".to_string()), &request(false))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(created.id, "81234567890");
        assert_eq!(created.password, "abc");
    }

    #[tokio::test]
    async fn list_meetings_reads_upcoming() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/me/meetings")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("type".into(), "upcoming".into()),
                mockito::Matcher::UrlEncoded("page_size".into(), "100".into()),
            ]))
            .match_header("authorization", "Bearer user-token")
            .with_status(200)
            .with_body(
                r#"{"page_size":100,"total_records":2,"meetings":[
                    {"id": 81234567890, "topic": "Algebra", "start_time": "2030-01-05T10:00:00Z", "duration": 45, "join_url": "https://zoom.us/j/81234567890"},
                    {"id": 85550001111, "topic": "Staff sync", "type": 3}
                ]}"#,
            )
            .create_async()
            .await;

        let client = ZoomClient::new(&server.url());
        let meetings = client.list_meetings(&ZoomAuth::Bearer("user-token".to_string())).await.unwrap();

        mock.assert_async().await;
        assert_eq!(meetings.len(), 2);
        assert_eq!(meetings[0].id(), "81234567890");
        assert_eq!(meetings[0].topic, "Algebra");
        assert_eq!(meetings[0].duration, 45);
        assert_eq!(meetings[0].start_time, Some(Utc.with_ymd_and_hms(2030, 1, 5, 10, 0, 0).unwrap()));
        assert_eq!(meetings[1].start_time, None);
        assert!(meetings[1].join_url.is_empty());
    }

    #[tokio::test]
    async fn unexpected_status_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/meetings/42")
            .with_status(404)
            .with_body(r#"{"code":3001,"message":"Meeting does not exist"}"#)
            .create_async()
            .await;

        let client = ZoomClient::new(&server.url());
        let err = client
            .delete_meeting(&ZoomAuth::Bearer("t".to_string()), "42")
            .await
            .unwrap_err();
        assert!(matches!(err, MeetingError::Http { status: 404, .. }));
    }
}
