use guardian_common::types::{AlertType, FiredRule, RawEvent, Severity};

use crate::config::RuleConfig;
use crate::FraudRule;

/// Fires when a payout's destination bank country disagrees with where
/// the account's recent charges actually come from. The destination is
/// taken from the payout's external account country, falling back to
/// the currency prefix when Stripe omits it.
pub struct GeoMismatchRule;

impl FraudRule for GeoMismatchRule {
    fn alert_type(&self) -> AlertType {
        AlertType::GeoMismatch
    }

    fn evaluate(
        &self,
        event: &RawEvent,
        history: &[RawEvent],
        config: &RuleConfig,
    ) -> Option<FiredRule> {
        let cfg = &config.geo_mismatch;
        if !cfg.enabled {
            return None;
        }
        let payout = event.payout()?;
        let bank_country = payout.bank_country()?;

        let mismatched = history
            .iter()
            .filter(|e| e.event_type == "charge.succeeded" && e.occurred_at <= event.occurred_at)
            .filter_map(|e| e.charge().and_then(|c| c.charge_country()))
            .filter(|country| *country != bank_country)
            .count() as u32;
        if mismatched < cfg.mismatch_charge_count {
            return None;
        }
        Some(FiredRule {
            alert_type: AlertType::GeoMismatch,
            severity: Severity::Medium,
            message: format!(
                "Payout destined for {bank_country} but {mismatched} recent charges \
                 came from elsewhere"
            ),
            payout_id: payout.id,
            auto_pause: false,
        })
    }
}
