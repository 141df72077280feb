pub mod meeting;
pub mod notify;
pub mod payment;
pub mod storage;
pub mod tutor_ai;

use sqlx::PgPool;

use crate::config::{AppConfig, ZoomConfig};
use meeting::{AccountMeetings, MeetingLifecycle, ZoomOAuth};
use notify::Notifier;
use payment::StripeClient;
use storage::Storage;
use tutor_ai::Tutor;

/// Outbound integrations shared by all workers through `web::Data`.
#[derive(Clone)]
pub struct Services {
    pub config: AppConfig,
    pub meetings: MeetingLifecycle,
    pub zoom_oauth: Option<ZoomOAuth>,
    pub zoom_account: Option<AccountMeetings>,
    pub notifier: Notifier,
    pub tutor: Tutor,
    pub stripe: Option<StripeClient>,
    pub storage: Option<Storage>,
}

impl Services {
    pub async fn from_config(config: &AppConfig, pool: &PgPool) -> Self {
        Self {
            config: config.clone(),
            meetings: MeetingLifecycle::from_config(&config.zoom, pool),
            zoom_oauth: ZoomOAuth::from_config(&config.zoom),
            zoom_account: AccountMeetings::from_config(&config.zoom, pool),
            notifier: Notifier::from_config(&config.email),
            tutor: Tutor::from_config(&config.openai, &config.app_name),
            stripe: StripeClient::from_config(&config.stripe),
            storage: Storage::from_config(&config.storage).await,
        }
    }

    /// No outbound integrations; mail goes only to the local fallback relay.
    pub fn offline(config: &AppConfig) -> Self {
        Self {
            config: config.clone(),
            meetings: MeetingLifecycle::default(),
            zoom_oauth: None,
            zoom_account: None,
            notifier: Notifier::from_config(&config.email),
            tutor: Tutor::new(None, &config.app_name),
            stripe: None,
            storage: None,
        }
    }

    pub fn zoom(&self) -> &ZoomConfig {
        &self.config.zoom
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }
}
