//! Webhook-backed notification sink

use super::{Notification, NotificationSink, NotifyError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Sink posting rendered notifications to per-channel webhook URLs.
///
/// A channel without a registered webhook is a permission refusal from the
/// watcher's point of view: the item stays uncommitted and retries later.
pub struct WebhookSink {
    client: reqwest::Client,
    /// Channel identifier -> webhook URL
    webhooks: HashMap<String, String>,
    /// Endpoint receiving presence text updates, when configured
    presence_url: Option<String>,
}

impl WebhookSink {
    pub fn new(webhooks: HashMap<String, String>, presence_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhooks,
            presence_url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn post(&self, channel: &str, notification: &Notification) -> Result<(), NotifyError> {
        let url = self.webhooks.get(channel).ok_or_else(|| {
            NotifyError::PermissionDenied(format!("no webhook registered for channel {}", channel))
        })?;

        let response = self
            .client
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotifyError::Other(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NotifyError::PermissionDenied(format!(
                "webhook for channel {} answered {}",
                channel, status
            )));
        }
        if !status.is_success() {
            return Err(NotifyError::Other(format!(
                "webhook for channel {} answered {}",
                channel, status
            )));
        }

        tracing::debug!(channel, title = %notification.title, "Notification delivered");
        Ok(())
    }

    async fn set_presence(&self, text: &str) -> Result<(), NotifyError> {
        let Some(url) = &self.presence_url else {
            tracing::debug!(text, "No presence endpoint configured, skipping update");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "status": text }))
            .send()
            .await
            .map_err(|e| NotifyError::Other(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Other(format!(
                "presence endpoint answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}
