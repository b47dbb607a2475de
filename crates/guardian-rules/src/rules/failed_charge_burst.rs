use chrono::Duration;
use guardian_common::types::{AlertType, FiredRule, RawEvent, Severity};

use crate::config::RuleConfig;
use crate::FraudRule;

/// Card-testing detector: a burst of failed charges inside a short
/// window. The triggering failure counts toward the threshold.
pub struct FailedChargeBurstRule;

impl FraudRule for FailedChargeBurstRule {
    fn alert_type(&self) -> AlertType {
        AlertType::FailedChargeBurst
    }

    fn evaluate(
        &self,
        event: &RawEvent,
        history: &[RawEvent],
        config: &RuleConfig,
    ) -> Option<FiredRule> {
        let cfg = &config.failed_charge_burst;
        if !cfg.enabled || event.event_type != "charge.failed" {
            return None;
        }
        let window_start = event.occurred_at - Duration::minutes(cfg.window_minutes as i64);
        let prior = history
            .iter()
            .filter(|e| {
                e.event_type == "charge.failed"
                    && e.occurred_at >= window_start
                    && e.occurred_at <= event.occurred_at
            })
            .count() as u32;
        let total = prior + 1;
        if total < cfg.min_failed_count {
            return None;
        }
        Some(FiredRule {
            alert_type: AlertType::FailedChargeBurst,
            severity: Severity::High,
            message: format!(
                "{total} failed charges within {} minutes",
                cfg.window_minutes
            ),
            payout_id: None,
            auto_pause: false,
        })
    }
}
