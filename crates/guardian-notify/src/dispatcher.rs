use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use guardian_storage::entities::{alert, notification_item};
use guardian_storage::GuardianStore;
use tokio::sync::watch;

use crate::channels::{AlertMessage, NotificationChannel};
use crate::error::NotifyError;
use crate::pause::PayoutPauser;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// How often the queue is polled when idle.
    pub poll_interval: std::time::Duration,
    /// How long a `sending` claim is honored before being reclaimed.
    pub lease: chrono::Duration,
    /// First retry delay; doubles per attempt with +-10% jitter.
    pub base_backoff_secs: f64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(2),
            lease: chrono::Duration::minutes(5),
            base_backoff_secs: 1.0,
        }
    }
}

/// What a single `dispatch_next` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing due.
    Idle,
    Sent,
    Retried,
    Dead,
}

/// Drains the persistent notification queue. Every queue item has
/// exactly one terminal state: `sent` after a successful delivery, or
/// `dead` once `max_attempts` deliveries have failed. Alerts flagged
/// `auto_pause` trigger the payout pauser from here, once per alert.
pub struct Dispatcher {
    store: Arc<GuardianStore>,
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
    pauser: Option<Arc<dyn PayoutPauser>>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        store: Arc<GuardianStore>,
        pauser: Option<Arc<dyn PayoutPauser>>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            store,
            channels: HashMap::new(),
            pauser,
            settings,
        }
    }

    pub fn register_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        self.channels
            .insert(channel.channel_type().to_string(), channel);
    }

    /// Claims and processes at most one due item.
    pub async fn dispatch_next(&self) -> anyhow::Result<DispatchOutcome> {
        let now = Utc::now();
        let Some(item) = self
            .store
            .claim_due_notification(now, self.settings.lease)
            .await?
        else {
            return Ok(DispatchOutcome::Idle);
        };
        let attempt = item.attempt + 1;

        let alert = self.store.get_alert(&item.alert_id).await?;
        if let Some(alert) = &alert {
            self.maybe_pause(alert).await?;
        }
        let message = render(alert.as_ref(), &item);

        let result = match self.channels.get(&item.channel) {
            Some(channel) => channel.send(&item.destination, &message).await,
            None => Err(NotifyError::UnknownChannel(item.channel.clone())),
        };
        match result {
            Ok(()) => {
                self.store.mark_notification_sent(&item.id).await?;
                tracing::info!(
                    alert_id = %item.alert_id,
                    channel = %item.channel,
                    attempt,
                    "Notification sent"
                );
                Ok(DispatchOutcome::Sent)
            }
            Err(err) if attempt >= item.max_attempts => {
                self.store
                    .mark_notification_dead(&item, &err.to_string())
                    .await?;
                tracing::error!(
                    alert_id = %item.alert_id,
                    channel = %item.channel,
                    attempts = attempt,
                    error = %err,
                    "Notification exhausted retries"
                );
                Ok(DispatchOutcome::Dead)
            }
            Err(err) => {
                let delay = backoff_delay(self.settings.base_backoff_secs, attempt);
                self.store
                    .retry_notification(&item.id, attempt, now + delay, &err.to_string())
                    .await?;
                tracing::warn!(
                    alert_id = %item.alert_id,
                    channel = %item.channel,
                    attempt,
                    error = %err,
                    "Notification failed, will retry"
                );
                Ok(DispatchOutcome::Retried)
            }
        }
    }

    /// Pauses payouts for an unresolved `auto_pause` alert. A
    /// successful pause resolves the alert, so retries and sibling
    /// queue items do not pause twice. A pause failure is logged and
    /// leaves the delivery outcome untouched.
    async fn maybe_pause(&self, alert: &alert::Model) -> anyhow::Result<()> {
        if !alert.auto_pause || alert.resolved {
            return Ok(());
        }
        let Some(pauser) = &self.pauser else {
            return Ok(());
        };
        if let Some(account) = self.store.get_account(&alert.account_id).await? {
            if account.payouts_paused {
                return Ok(());
            }
        }
        match pauser.pause_payouts(&alert.account_id).await {
            Ok(()) => {
                self.store
                    .set_payouts_paused(&alert.account_id, true)
                    .await?;
                self.store.resolve_alert(&alert.id).await?;
                tracing::warn!(
                    account_id = %alert.account_id,
                    alert_id = %alert.id,
                    alert_type = %alert.alert_type,
                    "Payouts auto-paused"
                );
            }
            Err(err) => {
                tracing::error!(
                    account_id = %alert.account_id,
                    alert_id = %alert.id,
                    error = %err,
                    "Auto-pause failed"
                );
            }
        }
        Ok(())
    }

    /// Runs until the shutdown flag flips, draining everything due on
    /// each tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.settings.poll_interval);
        loop {
            tokio::select! {
                _ = tick.tick() => loop {
                    match self.dispatch_next().await {
                        Ok(DispatchOutcome::Idle) => break,
                        Ok(_) => {}
                        Err(err) => {
                            tracing::error!(error = %err, "Dispatch failed");
                            break;
                        }
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Dispatcher stopping");
                        return;
                    }
                }
            }
        }
    }
}

fn render(alert: Option<&alert::Model>, item: &notification_item::Model) -> AlertMessage {
    let Some(alert) = alert else {
        // Queue items can outlive operator-deleted alerts.
        return AlertMessage {
            subject: format!("Guardian alert {}", item.alert_id),
            body: "Alert details are no longer available.".to_string(),
        };
    };
    AlertMessage {
        subject: format!(
            "[{}] {} on {}",
            alert.severity.to_uppercase(),
            alert.alert_type,
            alert.account_id
        ),
        body: format!(
            "{}\n\nRisk score: {}\nAccount: {}\nAlert id: {}",
            alert.message, alert.risk_score, alert.account_id, alert.id
        ),
    }
}

/// `base * 2^(attempt-1)` seconds, jittered by +-10% so synchronized
/// failures do not retry in lockstep.
fn backoff_delay(base_secs: f64, attempt: i32) -> chrono::Duration {
    let exponential = base_secs * 2f64.powi((attempt - 1).max(0));
    let jitter = 1.0 + (rand::random::<f64>() * 0.2 - 0.1);
    chrono::Duration::milliseconds((exponential * jitter * 1000.0) as i64)
}

#[cfg(test)]
mod backoff_tests {
    use super::backoff_delay;

    #[test]
    fn delay_doubles_within_jitter_bounds() {
        for attempt in 1..=5 {
            let expected_ms = 1000.0 * 2f64.powi(attempt - 1);
            let got = backoff_delay(1.0, attempt).num_milliseconds() as f64;
            assert!(got >= expected_ms * 0.9 - 1.0, "attempt {attempt}: {got}");
            assert!(got <= expected_ms * 1.1 + 1.0, "attempt {attempt}: {got}");
        }
    }

    #[test]
    fn zero_base_means_immediate_retry() {
        assert_eq!(backoff_delay(0.0, 3).num_milliseconds(), 0);
    }
}
