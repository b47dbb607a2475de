use guardian_common::types::{AlertType, FiredRule, RawEvent, Severity};

use crate::config::RuleConfig;
use crate::FraudRule;

/// A review opened by Stripe's rule engine (`reason == "rule"`), as
/// opposed to a manual review, is treated as a high-risk signal.
pub struct HighRiskReviewRule;

impl FraudRule for HighRiskReviewRule {
    fn alert_type(&self) -> AlertType {
        AlertType::HighRiskReview
    }

    fn evaluate(
        &self,
        event: &RawEvent,
        _history: &[RawEvent],
        config: &RuleConfig,
    ) -> Option<FiredRule> {
        if !config.high_risk_review.enabled {
            return None;
        }
        let review = event.review()?;
        if review.reason.as_deref() != Some("rule") {
            return None;
        }
        let charge = review
            .charge_id()
            .map(|id| format!(" on charge {id}"))
            .unwrap_or_default();
        Some(FiredRule {
            alert_type: AlertType::HighRiskReview,
            severity: Severity::High,
            message: format!("Stripe opened a rule-triggered review{charge}"),
            payout_id: None,
            auto_pause: false,
        })
    }
}
