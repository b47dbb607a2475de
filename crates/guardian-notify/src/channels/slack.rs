use std::time::Duration;

use async_trait::async_trait;

use super::{AlertMessage, NotificationChannel};
use crate::error::NotifyError;

/// Incoming-webhook delivery. The destination is the full webhook URL.
pub struct SlackChannel {
    client: reqwest::Client,
}

impl SlackChannel {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn channel_type(&self) -> &str {
        "slack"
    }

    async fn send(&self, destination: &str, message: &AlertMessage) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "text": format!("*{}*\n{}", message.subject, message.body),
        });
        let response = self.client.post(destination).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Delivery {
                channel: "slack".to_string(),
                reason: format!("status {}", response.status()),
            });
        }
        Ok(())
    }
}
