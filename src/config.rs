use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const BIND_ADDR: &str = "BIND_ADDR";
    /// Absolute base URL used in emails and payment redirects.
    pub const PUBLIC_URL: &str = "PUBLIC_URL";
    pub const SESSION_KEY: &str = "SESSION_KEY";
    pub const APP_NAME: &str = "APP_NAME";
    pub const ADMIN_USERNAME: &str = "ADMIN_USERNAME";
    pub const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
    pub const ADMIN_EMAIL: &str = "ADMIN_EMAIL";

    pub const ZOOM_API_KEY: &str = "ZOOM_API_KEY";
    pub const ZOOM_API_SECRET: &str = "ZOOM_API_SECRET";
    pub const ZOOM_CLIENT_ID: &str = "ZOOM_CLIENT_ID";
    pub const ZOOM_CLIENT_SECRET: &str = "ZOOM_CLIENT_SECRET";
    pub const ZOOM_REDIRECT_URI: &str = "ZOOM_REDIRECT_URI";
    pub const ZOOM_SDK_KEY: &str = "ZOOM_SDK_KEY";
    pub const ZOOM_SDK_SECRET: &str = "ZOOM_SDK_SECRET";
    pub const ZOOM_API_BASE: &str = "ZOOM_API_BASE";
    pub const ZOOM_OAUTH_BASE: &str = "ZOOM_OAUTH_BASE";

    pub const AWS_STORAGE_BUCKET_NAME: &str = "AWS_STORAGE_BUCKET_NAME";
    pub const AWS_REGION: &str = "AWS_REGION";

    pub const STRIPE_SECRET_KEY: &str = "STRIPE_SECRET_KEY";
    pub const STRIPE_WEBHOOK_SECRET: &str = "STRIPE_WEBHOOK_SECRET";
    pub const STRIPE_API_BASE: &str = "STRIPE_API_BASE";

    pub const SMTP_HOST: &str = "SMTP_HOST";
    pub const SMTP_PORT: &str = "SMTP_PORT";
    pub const SMTP_USER: &str = "SMTP_USER";
    pub const SMTP_PASS: &str = "SMTP_PASS";
    pub const SENDGRID_API_KEY: &str = "SENDGRID_API_KEY";
    pub const SENDGRID_API_BASE: &str = "SENDGRID_API_BASE";
    pub const EMAIL_FALLBACK_HOST: &str = "EMAIL_FALLBACK_HOST";
    pub const EMAIL_FALLBACK_PORT: &str = "EMAIL_FALLBACK_PORT";
    pub const DEFAULT_FROM_EMAIL: &str = "DEFAULT_FROM_EMAIL";

    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
    pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
}

/// Default values
pub mod defaults {
    pub const BIND_ADDR: &str = "127.0.0.1:8080";
    pub const PUBLIC_URL: &str = "http://127.0.0.1:8080";
    pub const APP_NAME: &str = "ClassLearn";
    pub const ADMIN_USERNAME: &str = "admin";
    pub const ADMIN_PASSWORD: &str = "admin123";
    pub const ADMIN_EMAIL: &str = "admin@example.com";
    pub const ZOOM_API_BASE: &str = "https://api.zoom.us/v2";
    pub const ZOOM_OAUTH_BASE: &str = "https://zoom.us/oauth";
    pub const AWS_REGION: &str = "us-east-1";
    pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
    pub const SMTP_PORT: u16 = 587;
    pub const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";
    pub const EMAIL_FALLBACK_HOST: &str = "localhost";
    pub const EMAIL_FALLBACK_PORT: u16 = 25;
    pub const DEFAULT_FROM_EMAIL: &str = "noreply@classlearn.local";
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    pub const OPENAI_MODEL: &str = "gpt-4o";
    /// Registration fee in minor units (paise): 1000 INR.
    pub const REGISTRATION_FEE: i64 = 100_000;
    pub const REGISTRATION_CURRENCY: &str = "inr";
    /// Lifetime of an emailed password reset link.
    pub const PASSWORD_RESET_TTL_HOURS: i64 = 72;
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn var_or(name: &str, default: &str) -> String {
    var(name).unwrap_or_else(|| default.to_string())
}

/// Display name for page titles; read on each call so tests can run without
/// a full `AppConfig`.
pub fn app_name() -> String {
    var_or(env_vars::APP_NAME, defaults::APP_NAME)
}

#[derive(Debug, Clone, Default)]
pub struct ZoomConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub sdk_key: Option<String>,
    pub sdk_secret: Option<String>,
    pub api_base: String,
    pub oauth_base: String,
}

impl ZoomConfig {
    /// Server credentials for the JWT path.
    pub fn jwt_configured(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    /// Client credentials for the per-user OAuth path.
    pub fn oauth_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.redirect_uri.is_some()
    }

    pub fn sdk_configured(&self) -> bool {
        self.sdk_key.is_some() && self.sdk_secret.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    pub region: String,
}

impl StorageConfig {
    pub fn is_configured(&self) -> bool {
        self.bucket.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

impl StripeConfig {
    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_api_base: String,
    pub fallback_host: String,
    pub fallback_port: u16,
    pub from_address: String,
}

impl EmailConfig {
    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_user.is_some() && self.smtp_pass.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl OpenAiConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub public_url: String,
    pub session_key: Option<String>,
    pub app_name: String,
    pub admin_username: String,
    pub admin_password: String,
    pub admin_email: String,
    pub zoom: ZoomConfig,
    pub storage: StorageConfig,
    pub stripe: StripeConfig,
    pub email: EmailConfig,
    pub openai: OpenAiConfig,
}

impl AppConfig {
    /// Read the whole configuration from the process environment.
    /// Call `dotenvy::dotenv()` first to pick up a local `.env`.
    pub fn from_env() -> Self {
        let port = |name: &str, default: u16| {
            var(name).and_then(|p| p.parse().ok()).unwrap_or(default)
        };

        Self {
            database_url: var(env_vars::DATABASE_URL),
            bind_addr: var_or(env_vars::BIND_ADDR, defaults::BIND_ADDR),
            public_url: var_or(env_vars::PUBLIC_URL, defaults::PUBLIC_URL)
                .trim_end_matches('/')
                .to_string(),
            session_key: var(env_vars::SESSION_KEY),
            app_name: var_or(env_vars::APP_NAME, defaults::APP_NAME),
            admin_username: var_or(env_vars::ADMIN_USERNAME, defaults::ADMIN_USERNAME),
            admin_password: var_or(env_vars::ADMIN_PASSWORD, defaults::ADMIN_PASSWORD),
            admin_email: var_or(env_vars::ADMIN_EMAIL, defaults::ADMIN_EMAIL),
            zoom: ZoomConfig {
                api_key: var(env_vars::ZOOM_API_KEY),
                api_secret: var(env_vars::ZOOM_API_SECRET),
                client_id: var(env_vars::ZOOM_CLIENT_ID),
                client_secret: var(env_vars::ZOOM_CLIENT_SECRET),
                redirect_uri: var(env_vars::ZOOM_REDIRECT_URI),
                sdk_key: var(env_vars::ZOOM_SDK_KEY),
                sdk_secret: var(env_vars::ZOOM_SDK_SECRET),
                api_base: var_or(env_vars::ZOOM_API_BASE, defaults::ZOOM_API_BASE),
                oauth_base: var_or(env_vars::ZOOM_OAUTH_BASE, defaults::ZOOM_OAUTH_BASE),
            },
            storage: StorageConfig {
                bucket: var(env_vars::AWS_STORAGE_BUCKET_NAME),
                region: var_or(env_vars::AWS_REGION, defaults::AWS_REGION),
            },
            stripe: StripeConfig {
                secret_key: var(env_vars::STRIPE_SECRET_KEY),
                webhook_secret: var(env_vars::STRIPE_WEBHOOK_SECRET),
                api_base: var_or(env_vars::STRIPE_API_BASE, defaults::STRIPE_API_BASE),
            },
            email: EmailConfig {
                smtp_host: var(env_vars::SMTP_HOST),
                smtp_port: port(env_vars::SMTP_PORT, defaults::SMTP_PORT),
                smtp_user: var(env_vars::SMTP_USER),
                smtp_pass: var(env_vars::SMTP_PASS),
                sendgrid_api_key: var(env_vars::SENDGRID_API_KEY),
                sendgrid_api_base: var_or(env_vars::SENDGRID_API_BASE, defaults::SENDGRID_API_BASE),
                fallback_host: var_or(env_vars::EMAIL_FALLBACK_HOST, defaults::EMAIL_FALLBACK_HOST),
                fallback_port: port(env_vars::EMAIL_FALLBACK_PORT, defaults::EMAIL_FALLBACK_PORT),
                from_address: var_or(env_vars::DEFAULT_FROM_EMAIL, defaults::DEFAULT_FROM_EMAIL),
            },
            openai: OpenAiConfig {
                api_key: var(env_vars::OPENAI_API_KEY),
                base_url: var_or(env_vars::OPENAI_BASE_URL, defaults::OPENAI_BASE_URL),
                model: var_or(env_vars::OPENAI_MODEL, defaults::OPENAI_MODEL),
            },
        }
    }

    /// Build an absolute link for emails and redirects.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.public_url, path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: defaults::BIND_ADDR.to_string(),
            public_url: defaults::PUBLIC_URL.to_string(),
            session_key: None,
            app_name: defaults::APP_NAME.to_string(),
            admin_username: defaults::ADMIN_USERNAME.to_string(),
            admin_password: defaults::ADMIN_PASSWORD.to_string(),
            admin_email: defaults::ADMIN_EMAIL.to_string(),
            zoom: ZoomConfig {
                api_base: defaults::ZOOM_API_BASE.to_string(),
                oauth_base: defaults::ZOOM_OAUTH_BASE.to_string(),
                ..Default::default()
            },
            storage: StorageConfig {
                bucket: None,
                region: defaults::AWS_REGION.to_string(),
            },
            stripe: StripeConfig {
                api_base: defaults::STRIPE_API_BASE.to_string(),
                ..Default::default()
            },
            email: EmailConfig {
                smtp_port: defaults::SMTP_PORT,
                sendgrid_api_base: defaults::SENDGRID_API_BASE.to_string(),
                fallback_host: defaults::EMAIL_FALLBACK_HOST.to_string(),
                fallback_port: defaults::EMAIL_FALLBACK_PORT,
                from_address: defaults::DEFAULT_FROM_EMAIL.to_string(),
                ..Default::default()
            },
            openai: OpenAiConfig {
                api_key: None,
                base_url: defaults::OPENAI_BASE_URL.to_string(),
                model: defaults::OPENAI_MODEL.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_integrations() {
        let config = AppConfig::default();
        assert!(!config.zoom.jwt_configured());
        assert!(!config.zoom.oauth_configured());
        assert!(!config.stripe.is_configured());
        assert!(!config.storage.is_configured());
        assert!(!config.openai.is_configured());
        assert!(!config.email.smtp_configured());
    }

    #[test]
    fn absolute_url_joins_public_base() {
        let config = AppConfig::default();
        assert_eq!(config.absolute_url("/quizzes/3"), "http://127.0.0.1:8080/quizzes/3");
    }
}
