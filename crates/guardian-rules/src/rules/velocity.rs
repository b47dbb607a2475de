use chrono::Duration;
use guardian_common::types::{AlertType, FiredRule, RawEvent, Severity};

use crate::config::RuleConfig;
use crate::FraudRule;

/// Fires when a new payout pushes the count of payouts created within
/// the sliding window past the configured maximum. `max_payouts` prior
/// payouts are tolerated; the one after that fires.
pub struct VelocityRule;

impl FraudRule for VelocityRule {
    fn alert_type(&self) -> AlertType {
        AlertType::Velocity
    }

    fn evaluate(
        &self,
        event: &RawEvent,
        history: &[RawEvent],
        config: &RuleConfig,
    ) -> Option<FiredRule> {
        let cfg = &config.velocity;
        if !cfg.enabled || event.event_type != "payout.created" {
            return None;
        }
        let payout = event.payout()?;
        let window_start = event.occurred_at - Duration::seconds(cfg.window_seconds as i64);
        // Trailing window: anything after the trigger is not history.
        let prior = history
            .iter()
            .filter(|e| {
                e.event_type == "payout.created"
                    && e.occurred_at >= window_start
                    && e.occurred_at <= event.occurred_at
            })
            .count() as u32;
        // Including the trigger itself.
        let total = prior + 1;
        if total <= cfg.max_payouts {
            return None;
        }
        Some(FiredRule {
            alert_type: AlertType::Velocity,
            severity: Severity::High,
            message: format!(
                "{total} payouts created within {}s (limit {})",
                cfg.window_seconds, cfg.max_payouts
            ),
            payout_id: payout.id,
            auto_pause: true,
        })
    }
}
