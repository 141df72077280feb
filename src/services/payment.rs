//! Registration-fee checkout against the Stripe REST API.

use std::collections::HashMap;
use std::fmt;

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::{StripeConfig, defaults};

const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub enum PaymentError {
    NotConfigured,
    Api(String),
    Network(String),
    Parse(String),
    InvalidWebhook(String),
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::NotConfigured => write!(f, "Payments are not configured"),
            PaymentError::Api(msg) => write!(f, "Payment provider error: {msg}"),
            PaymentError::Network(msg) => write!(f, "Payment provider unreachable: {msg}"),
            PaymentError::Parse(msg) => write!(f, "Unexpected payment provider response: {msg}"),
            PaymentError::InvalidWebhook(msg) => write!(f, "Invalid webhook: {msg}"),
        }
    }
}

impl std::error::Error for PaymentError {}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// The registering user, carried in checkout metadata.
    pub fn user_id(&self) -> Option<i64> {
        self.metadata.get("user_id").and_then(|v| v.parse().ok())
    }

    /// Reference stored on the user record.
    pub fn payment_reference(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// The checkout session for `checkout.session.completed`, otherwise None.
    pub fn completed_checkout(&self) -> Option<CheckoutSession> {
        if self.event_type != "checkout.session.completed" {
            return None;
        }
        serde_json::from_value(self.data.object.clone()).ok()
    }
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    api_key: String,
    webhook_secret: Option<String>,
    client: reqwest::Client,
    base_url: String,
}

impl StripeClient {
    pub fn new(api_key: &str, webhook_secret: Option<String>, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            webhook_secret,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &StripeConfig) -> Option<Self> {
        let key = config.secret_key.as_deref()?;
        Some(Self::new(key, config.webhook_secret.clone(), &config.api_base))
    }

    /// One-off checkout for the registration fee.
    pub async fn create_checkout_session(
        &self,
        user_id: i64,
        email: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let amount = defaults::REGISTRATION_FEE.to_string();
        let user = user_id.to_string();
        let success = format!("{success_url}?session_id={{CHECKOUT_SESSION_ID}}");
        let form: Vec<(&str, &str)> = vec![
            ("mode", "payment"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][quantity]", "1"),
            ("line_items[0][price_data][currency]", defaults::REGISTRATION_CURRENCY),
            ("line_items[0][price_data][unit_amount]", &amount),
            ("line_items[0][price_data][product_data][name]", "Student Registration"),
            ("customer_email", email),
            ("success_url", &success),
            ("cancel_url", cancel_url),
            ("metadata[user_id]", &user),
        ];

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .basic_auth(&self.api_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.base_url, urlencoding::encode(session_id)))
            .basic_auth(&self.api_key, None::<&str>)
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    pub fn verify_webhook(&self, payload: &str, signature: &str) -> Result<WebhookEvent, PaymentError> {
        let secret = self.webhook_secret.as_deref().ok_or(PaymentError::NotConfigured)?;
        verify_signature(secret, payload, signature, chrono::Utc::now().timestamp())?;
        serde_json::from_str(payload).map_err(|e| PaymentError::Parse(e.to_string()))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, PaymentError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if !status.is_success() {
            #[derive(Deserialize)]
            struct ApiError {
                error: ApiErrorDetail,
            }

            #[derive(Deserialize)]
            struct ApiErrorDetail {
                message: String,
            }

            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                return Err(PaymentError::Api(error.error.message));
            }
            return Err(PaymentError::Api(format!("HTTP {status}: {body}")));
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::Parse(e.to_string()))
    }
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>`) against the raw payload.
pub fn verify_signature(secret: &str, payload: &str, header: &str, now: i64) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidWebhook("Missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidWebhook("Missing signature".to_string()));
    }

    let expected = sign(secret, timestamp, payload)?;
    if !signatures.iter().any(|s| crate::auth::csrf::constant_time_eq(s, &expected)) {
        return Err(PaymentError::InvalidWebhook("Signature mismatch".to_string()));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidWebhook("Invalid timestamp".to_string()))?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(PaymentError::InvalidWebhook("Timestamp outside tolerance".to_string()));
    }

    Ok(())
}

/// Hex HMAC-SHA256 over `"{timestamp}.{payload}"`.
pub fn sign(secret: &str, timestamp: &str, payload: &str) -> Result<String, PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::InvalidWebhook("Invalid webhook secret".to_string()))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"id":"cs_1","payment_status":"paid","metadata":{"user_id":"42"}}}}"#;

    #[test]
    fn accepts_valid_signature() {
        let sig = sign(SECRET, "1700000000", PAYLOAD).unwrap();
        let header = format!("t=1700000000,v1={sig}");
        assert!(verify_signature(SECRET, PAYLOAD, &header, 1_700_000_100).is_ok());
    }

    #[test]
    fn rejects_tampered_payload_and_stale_timestamp() {
        let sig = sign(SECRET, "1700000000", PAYLOAD).unwrap();
        let header = format!("t=1700000000,v1={sig}");
        assert!(verify_signature(SECRET, "{}", &header, 1_700_000_000).is_err());
        assert!(verify_signature(SECRET, PAYLOAD, &header, 1_700_000_301).is_err());
        assert!(verify_signature(SECRET, PAYLOAD, "v1=abc", 1_700_000_000).is_err());
    }

    #[test]
    fn completed_checkout_carries_user_id() {
        let event: WebhookEvent = serde_json::from_str(PAYLOAD).unwrap();
        let session = event.completed_checkout().unwrap();
        assert!(session.is_paid());
        assert_eq!(session.user_id(), Some(42));
        assert_eq!(session.payment_reference(), "cs_1");
    }
}
