use guardian_common::types::{AlertType, FiredRule, RawEvent, Severity};

use crate::config::RuleConfig;
use crate::FraudRule;

/// Stripe flipping `payouts_enabled` from true to false usually means
/// its own risk systems intervened; surface that to the operator.
pub struct SuddenPayoutDisableRule;

impl FraudRule for SuddenPayoutDisableRule {
    fn alert_type(&self) -> AlertType {
        AlertType::SuddenPayoutDisable
    }

    fn evaluate(
        &self,
        event: &RawEvent,
        _history: &[RawEvent],
        config: &RuleConfig,
    ) -> Option<FiredRule> {
        if !config.sudden_payout_disable.enabled {
            return None;
        }
        let account = event.account()?;
        let was_enabled = event.previous_payouts_enabled()?;
        if !(was_enabled && account.payouts_enabled == Some(false)) {
            return None;
        }
        Some(FiredRule {
            alert_type: AlertType::SuddenPayoutDisable,
            severity: Severity::Medium,
            message: "Payouts were disabled on a previously enabled account".to_string(),
            payout_id: None,
            auto_pause: false,
        })
    }
}
