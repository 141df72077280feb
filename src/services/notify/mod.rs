//! Best-effort email: each configured backend is tried in order until one
//! accepts the message. Failures are logged, never raised to the caller.

mod backends;
pub mod messages;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use backends::{FallbackSmtpBackend, SendGridBackend, SmtpRelayBackend};

use crate::config::EmailConfig;

#[derive(Debug, Clone)]
pub enum NotifyError {
    Address(String),
    Build(String),
    Transport(String),
    Rejected(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Address(a) => write!(f, "Invalid address: {a}"),
            NotifyError::Build(e) => write!(f, "Could not build message: {e}"),
            NotifyError::Transport(e) => write!(f, "Transport error: {e}"),
            NotifyError::Rejected(e) => write!(f, "Rejected by provider: {e}"),
        }
    }
}

impl std::error::Error for NotifyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, text_body: impl Into<String>) -> Self {
        Self {
            to: vec![to.into()],
            subject: subject.into(),
            text_body: text_body.into(),
            html_body: None,
        }
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }
}

#[async_trait]
pub trait MailBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, from: &str, mail: &Email) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct Notifier {
    backends: Vec<Arc<dyn MailBackend>>,
    from: String,
}

impl Notifier {
    pub fn new(from: &str, backends: Vec<Arc<dyn MailBackend>>) -> Self {
        Self { backends, from: from.to_string() }
    }

    /// SMTP relay, then SendGrid, then the unauthenticated fallback relay.
    /// Backends without configuration are left out of the chain.
    pub fn from_config(config: &EmailConfig) -> Self {
        let mut chain: Vec<Arc<dyn MailBackend>> = Vec::new();

        if let (Some(host), Some(user), Some(pass)) =
            (&config.smtp_host, &config.smtp_user, &config.smtp_pass)
        {
            match SmtpRelayBackend::new(host, config.smtp_port, user, pass) {
                Ok(backend) => chain.push(Arc::new(backend)),
                Err(e) => log::warn!("SMTP relay disabled: {e}"),
            }
        }

        if let Some(key) = &config.sendgrid_api_key {
            chain.push(Arc::new(SendGridBackend::new(key, &config.sendgrid_api_base)));
        }

        chain.push(Arc::new(FallbackSmtpBackend::new(&config.fallback_host, config.fallback_port)));

        log::info!(
            "Email chain: {}",
            chain.iter().map(|b| b.name()).collect::<Vec<_>>().join(" -> ")
        );
        Self::new(&config.from_address, chain)
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// True when some backend accepted the message.
    pub async fn send(&self, mail: &Email) -> bool {
        if mail.to.is_empty() {
            return false;
        }

        for backend in &self.backends {
            match backend.send(&self.from, mail).await {
                Ok(()) => {
                    log::info!("Sent '{}' to {} via {}", mail.subject, mail.to.join(", "), backend.name());
                    return true;
                }
                Err(e) => log::warn!("{} failed for '{}': {e}", backend.name(), mail.subject),
            }
        }

        log::error!("All email backends failed for '{}'", mail.subject);
        false
    }

    /// Send on a background task; the caller does not wait for delivery.
    pub fn send_in_background(&self, mail: Email) {
        let notifier = self.clone();
        actix_web::rt::spawn(async move {
            notifier.send(&mail).await;
        });
    }

    /// Send one message per recipient in the background.
    pub fn broadcast_in_background(&self, recipients: Vec<String>, subject: String, text_body: String) {
        let notifier = self.clone();
        actix_web::rt::spawn(async move {
            for to in recipients {
                notifier.send(&Email::new(to, subject.clone(), text_body.clone())).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        ok: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl MailBackend for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn send(&self, _from: &str, _mail: &Email) -> Result<(), NotifyError> {
            self.calls.lock().unwrap().push(self.name);
            if self.ok { Ok(()) } else { Err(NotifyError::Transport("down".into())) }
        }
    }

    fn chain(results: &[(&'static str, bool)]) -> (Notifier, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backends = results
            .iter()
            .map(|(name, ok)| Arc::new(Recording { name: *name, ok: *ok, calls: calls.clone() }) as Arc<dyn MailBackend>)
            .collect();
        (Notifier::new("noreply@test", backends), calls)
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let (notifier, calls) = chain(&[("smtp", false), ("sendgrid", true), ("fallback", true)]);
        assert!(notifier.send(&Email::new("a@b.c", "Hi", "body")).await);
        assert_eq!(*calls.lock().unwrap(), vec!["smtp", "sendgrid"]);
    }

    #[tokio::test]
    async fn all_failing_reports_false() {
        let (notifier, calls) = chain(&[("smtp", false), ("fallback", false)]);
        assert!(!notifier.send(&Email::new("a@b.c", "Hi", "body")).await);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_recipients_sends_nothing() {
        let (notifier, calls) = chain(&[("smtp", true)]);
        let mut mail = Email::new("a@b.c", "Hi", "body");
        mail.to.clear();
        assert!(!notifier.send(&mail).await);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn unconfigured_chain_is_only_the_fallback() {
        let notifier = Notifier::from_config(&EmailConfig::default());
        assert_eq!(notifier.backend_names(), vec!["fallback-smtp"]);
    }
}
