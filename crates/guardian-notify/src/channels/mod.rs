mod email;
mod slack;

pub use email::EmailChannel;
pub use slack::SlackChannel;

use crate::error::NotifyError;

/// A message rendered from an alert, ready for any channel.
#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

#[async_trait::async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel name, matching `notification_queue.channel`.
    fn channel_type(&self) -> &str;

    async fn send(&self, destination: &str, message: &AlertMessage) -> Result<(), NotifyError>;
}
