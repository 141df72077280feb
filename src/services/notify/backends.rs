use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

use super::{Email, MailBackend, NotifyError};

fn build_message(from: &str, mail: &Email) -> Result<Message, NotifyError> {
    let from: Mailbox = from.parse().map_err(|_| NotifyError::Address(from.to_string()))?;
    let mut builder = Message::builder().from(from).subject(&mail.subject);
    for to in &mail.to {
        let mailbox: Mailbox = to.parse().map_err(|_| NotifyError::Address(to.clone()))?;
        builder = builder.to(mailbox);
    }

    let message = match &mail.html_body {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            mail.text_body.clone(),
            html.clone(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(mail.text_body.clone()),
    };
    message.map_err(|e| NotifyError::Build(e.to_string()))
}

/// Authenticated SMTP relay (STARTTLS).
pub struct SmtpRelayBackend {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelayBackend {
    pub fn new(host: &str, port: u16, user: &str, pass: &str) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl MailBackend for SmtpRelayBackend {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, from: &str, mail: &Email) -> Result<(), NotifyError> {
        let message = build_message(from, mail)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

/// SendGrid v3 mail/send over HTTPS.
pub struct SendGridBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SendGridBackend {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn payload(from: &str, mail: &Email) -> serde_json::Value {
        let mut content = vec![json!({ "type": "text/plain", "value": mail.text_body })];
        if let Some(html) = &mail.html_body {
            content.push(json!({ "type": "text/html", "value": html }));
        }
        json!({
            "personalizations": [{
                "to": mail.to.iter().map(|t| json!({ "email": t })).collect::<Vec<_>>()
            }],
            "from": { "email": from },
            "subject": mail.subject,
            "content": content,
        })
    }
}

#[async_trait]
impl MailBackend for SendGridBackend {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, from: &str, mail: &Email) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Self::payload(from, mail))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected(format!("HTTP {status}: {body}")))
        }
    }
}

/// Plain SMTP to a local relay, no TLS or auth. Last resort.
pub struct FallbackSmtpBackend {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl FallbackSmtpBackend {
    pub fn new(host: &str, port: u16) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();
        Self { transport }
    }
}

#[async_trait]
impl MailBackend for FallbackSmtpBackend {
    fn name(&self) -> &'static str {
        "fallback-smtp"
    }

    async fn send(&self, from: &str, mail: &Email) -> Result<(), NotifyError> {
        let message = build_message(from, mail)?;
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sendgrid_payload_includes_html_part() {
        let mail = Email::new("kid@example.com", "Hi", "plain").with_html("<p>rich</p>");
        let payload = SendGridBackend::payload("noreply@example.com", &mail);
        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "kid@example.com");
        assert_eq!(payload["content"][1]["type"], "text/html");
        assert_eq!(payload["from"]["email"], "noreply@example.com");
    }

    #[test]
    fn bad_recipient_is_an_address_error() {
        let mail = Email::new("not an address", "Hi", "plain");
        assert!(matches!(
            build_message("noreply@example.com", &mail),
            Err(NotifyError::Address(_))
        ));
    }
}
