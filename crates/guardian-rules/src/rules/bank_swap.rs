use chrono::Duration;
use guardian_common::types::{AlertType, FiredRule, RawEvent, Severity};

use crate::config::RuleConfig;
use crate::FraudRule;

/// Detects the classic drain pattern: the bank account on file changes,
/// then a large payout follows shortly after.
///
/// Two triggers produce an alert. An `account.updated` whose previous
/// attributes show the external accounts changed fires immediately. A
/// payout at or above `min_payout_usd` fires when a bank-account change
/// sits in the lookback window behind it.
pub struct BankSwapRule;

fn is_bank_change(event: &RawEvent) -> bool {
    event.event_type == "external_account.created" || event.external_accounts_changed()
}

impl FraudRule for BankSwapRule {
    fn alert_type(&self) -> AlertType {
        AlertType::BankSwap
    }

    fn evaluate(
        &self,
        event: &RawEvent,
        history: &[RawEvent],
        config: &RuleConfig,
    ) -> Option<FiredRule> {
        let cfg = &config.bank_swap;
        if !cfg.enabled {
            return None;
        }

        if event.external_accounts_changed() {
            return Some(FiredRule {
                alert_type: AlertType::BankSwap,
                severity: Severity::High,
                message: "Bank account on file was changed".to_string(),
                payout_id: None,
                auto_pause: true,
            });
        }

        let payout = event.payout()?;
        let amount_usd = payout.amount_usd()?;
        if amount_usd < cfg.min_payout_usd {
            return None;
        }
        let lookback_start = event.occurred_at - Duration::minutes(cfg.lookback_minutes as i64);
        let armed = history.iter().any(|e| {
            e.occurred_at >= lookback_start
                && e.occurred_at <= event.occurred_at
                && is_bank_change(e)
        });
        if !armed {
            return None;
        }
        Some(FiredRule {
            alert_type: AlertType::BankSwap,
            severity: Severity::High,
            message: format!(
                "Payout of ${amount_usd:.2} within {} minutes of a bank account change",
                cfg.lookback_minutes
            ),
            payout_id: payout.id,
            auto_pause: true,
        })
    }
}
