use std::env;
use tracing::warn;

pub const DEFAULT_CONSULTATION_MINUTES: u32 = 15;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub notification_webhook_url: String,
    pub default_consultation_minutes: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let config = Self {
            notification_webhook_url: env::var("NOTIFICATION_WEBHOOK_URL")
                .unwrap_or_else(|_| {
                    warn!("NOTIFICATION_WEBHOOK_URL not set, using empty value");
                    String::new()
                }),
            default_consultation_minutes: env::var("DEFAULT_CONSULTATION_MINUTES")
                .ok()
                .and_then(|raw| match raw.parse::<u32>() {
                    Ok(minutes) if minutes > 0 => Some(minutes),
                    _ => {
                        warn!("DEFAULT_CONSULTATION_MINUTES is not a positive integer, using default");
                        None
                    }
                })
                .unwrap_or(DEFAULT_CONSULTATION_MINUTES),
        };

        if !config.is_configured() {
            warn!("Notification webhook not configured - outbound notifications will be log-only");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.notification_webhook_url.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notification_webhook_url: String::new(),
            default_consultation_minutes: DEFAULT_CONSULTATION_MINUTES,
        }
    }
}
