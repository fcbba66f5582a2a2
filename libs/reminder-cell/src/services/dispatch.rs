// libs/reminder-cell/src/services/dispatch.rs
//
// Outbound notification edge. Everything above this trait is transport
// agnostic; swapping email for SMS or push is a new implementation, not a
// scheduler change.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("notification transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("notification service not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to_address: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Dispatcher over the hosted notification API.
pub struct HttpNotificationDispatcher {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpNotificationDispatcher {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.notify_api_url.clone(),
            api_key: config.notify_api_key.clone(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for HttpNotificationDispatcher {
    async fn dispatch(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        if self.api_url.is_empty() || self.api_key.is_empty() {
            return Err(DispatchError::NotConfigured);
        }

        debug!("Dispatching notification to {}", message.to_address);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "to": message.to_address,
                "subject": message.subject,
                "html": message.html,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
