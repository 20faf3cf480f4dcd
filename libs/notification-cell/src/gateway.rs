// libs/notification-cell/src/gateway.rs
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{NotificationError, NotificationEvent};

/// Fire-and-forget event dispatch. Callers invoke `notify` after their own
/// transaction has committed and swallow any error it returns.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotificationError>;
}

/// Renders events into the application log. Used when no delivery channel is
/// configured.
pub struct LogGateway;

impl LogGateway {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        let Some(patient_email) = event.patient_email.clone() else {
            warn!(
                "Could not deliver {} notification for appointment {}: patient email not found",
                event.kind, event.appointment_id
            );
            return Ok(());
        };

        info!(
            to = %patient_email,
            cc = event.doctor_email.as_deref().unwrap_or("-"),
            subject = %event.subject(),
            "{}",
            event.body()
        );
        Ok(())
    }
}

/// Posts the serialized event to an external delivery endpoint.
pub struct WebhookGateway {
    client: Client,
    endpoint: String,
}

impl WebhookGateway {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_endpoint(config.notification_webhook_url.clone())
    }

    pub fn with_endpoint(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl NotificationGateway for WebhookGateway {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        if self.endpoint.is_empty() {
            return Err(NotificationError::Channel(
                "no notification endpoint configured".to_string(),
            ));
        }

        debug!(
            "Dispatching {} notification for appointment {} to {}",
            event.kind, event.appointment_id, self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&event)
            .send()
            .await
            .map_err(|err| NotificationError::Channel(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected(format!("{}: {}", status, detail)));
        }

        Ok(())
    }
}

/// Records events in memory. Backs tests and local development.
pub struct MemoryGateway {
    events: Mutex<Vec<NotificationEvent>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }

    pub async fn drain(&self) -> Vec<NotificationEvent> {
        std::mem::take(&mut *self.events.lock().await)
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationGateway for MemoryGateway {
    async fn notify(&self, event: NotificationEvent) -> Result<(), NotificationError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
