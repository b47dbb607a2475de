//! The ingestion pipeline: dedup, rule evaluation, scoring, alert
//! materialization and notification enqueue. Live webhook deliveries
//! and backfilled events run through the same path; only the recorded
//! source differs. Auto-pause is a dispatcher concern.

use std::sync::Arc;

use chrono::Duration;
use guardian_common::types::{EventSource, RawEvent};
use guardian_rules::config::RuleConfig;
use guardian_rules::{score, RuleEngine};
use guardian_storage::entities::alert;
use guardian_storage::{AlertInsert, GuardianStore, InsertOutcome};

use crate::config_cache::RuleConfigCache;

/// Floor on the history window so rules that reason over "recent"
/// activity without their own window (geo mismatch) see a full day.
const HISTORY_FLOOR_SECS: i64 = 86_400;

/// Destination defaults and queue settings for new notifications.
#[derive(Debug, Clone)]
pub struct NotifyTargets {
    pub max_attempts: u32,
    pub email_enabled: bool,
    pub default_email: Option<String>,
    pub slack_enabled: bool,
    pub default_slack_webhook: Option<String>,
}

impl Default for NotifyTargets {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            email_enabled: false,
            default_email: None,
            slack_enabled: false,
            default_slack_webhook: None,
        }
    }
}

/// What happened to one delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Seen before; nothing ran.
    Duplicate,
    Processed { alerts_created: usize },
}

pub struct Pipeline {
    store: Arc<GuardianStore>,
    engine: RuleEngine,
    config_cache: Arc<RuleConfigCache>,
    targets: NotifyTargets,
}

impl Pipeline {
    pub fn new(
        store: Arc<GuardianStore>,
        config_cache: Arc<RuleConfigCache>,
        targets: NotifyTargets,
    ) -> Self {
        Self {
            store,
            engine: RuleEngine::default(),
            config_cache,
            targets,
        }
    }

    /// Runs one event through the pipeline. A duplicate returns
    /// immediately; an accepted event that fails mid-evaluation is
    /// dead-lettered rather than bubbled, so the webhook can still ack
    /// the delivery.
    pub async fn process(
        &self,
        event: &RawEvent,
        source: EventSource,
    ) -> anyhow::Result<IngestOutcome> {
        if !self.store.accept_event(event, source).await? {
            tracing::debug!(event_id = %event.event_id, "Duplicate event, skipping");
            return Ok(IngestOutcome::Duplicate);
        }
        match self.evaluate(event).await {
            Ok(alerts_created) => Ok(IngestOutcome::Processed { alerts_created }),
            Err(err) => {
                tracing::error!(
                    event_id = %event.event_id,
                    account_id = %event.account_id,
                    error = %err,
                    "Pipeline failed after event acceptance"
                );
                self.store
                    .insert_dead_letter(
                        "pipeline",
                        &event.event_id,
                        Some(&event.account_id),
                        Some(event.payload.to_string()),
                        &format!("{err:#}"),
                    )
                    .await?;
                Ok(IngestOutcome::Processed { alerts_created: 0 })
            }
        }
    }

    async fn evaluate(&self, event: &RawEvent) -> anyhow::Result<usize> {
        let config = self.config_cache.get(&event.account_id).await?;
        let since = event.occurred_at - Duration::seconds(history_window_secs(&config));
        let history = self
            .store
            .recent_events(&event.account_id, since, event.occurred_at, &event.event_id)
            .await?;
        let fired = self.engine.evaluate(event, &history, &config);

        let mut created = 0;
        for rule in &fired {
            let account_fp = self
                .store
                .account_fp_rate(&event.account_id, rule.alert_type)
                .await?;
            let global_fp = self.store.global_fp_rate(rule.alert_type).await?;
            let risk_score = score::risk_score(rule.alert_type, account_fp, global_fp);

            let outcome = self
                .store
                .insert_alert(AlertInsert {
                    account_id: &event.account_id,
                    source_event_id: &event.event_id,
                    fired: rule,
                    risk_score,
                })
                .await?;
            let alert = match outcome {
                InsertOutcome::Created(alert) => alert,
                InsertOutcome::Duplicate => continue,
            };
            created += 1;
            tracing::info!(
                alert_id = %alert.id,
                alert_type = %alert.alert_type,
                account_id = %alert.account_id,
                risk_score,
                "Alert created"
            );
            self.enqueue_notifications(&alert).await?;
        }
        Ok(created)
    }

    /// Queues one item per enabled channel. Account-level settings win
    /// over platform defaults; a channel with no destination at either
    /// level is skipped.
    async fn enqueue_notifications(&self, alert: &alert::Model) -> anyhow::Result<()> {
        self.store.ensure_account(&alert.account_id).await?;
        let account = self.store.get_account(&alert.account_id).await?;
        let (account_email, account_slack, email_ok, slack_ok) = match &account {
            Some(a) => (
                a.email_to.clone(),
                a.slack_webhook_url.clone(),
                a.email_enabled,
                a.slack_enabled,
            ),
            None => (None, None, true, true),
        };

        if self.targets.email_enabled && email_ok {
            if let Some(dest) = account_email.or_else(|| self.targets.default_email.clone()) {
                self.store
                    .enqueue_notification(
                        &alert.id,
                        &alert.account_id,
                        "email",
                        &dest,
                        self.targets.max_attempts,
                    )
                    .await?;
            }
        }
        if self.targets.slack_enabled && slack_ok {
            if let Some(dest) =
                account_slack.or_else(|| self.targets.default_slack_webhook.clone())
            {
                self.store
                    .enqueue_notification(
                        &alert.id,
                        &alert.account_id,
                        "slack",
                        &dest,
                        self.targets.max_attempts,
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

/// Widest lookback any rule needs, floored at one day.
fn history_window_secs(config: &RuleConfig) -> i64 {
    let mut secs = HISTORY_FLOOR_SECS;
    secs = secs.max(config.velocity.window_seconds as i64);
    secs = secs.max(config.bank_swap.lookback_minutes as i64 * 60);
    secs = secs.max(config.failed_charge_burst.window_minutes as i64 * 60);
    secs
}
