mod bank_swap;
mod failed_charge_burst;
mod geo_mismatch;
mod high_risk_review;
mod sudden_payout_disable;
mod velocity;

pub use bank_swap::BankSwapRule;
pub use failed_charge_burst::FailedChargeBurstRule;
pub use geo_mismatch::GeoMismatchRule;
pub use high_risk_review::HighRiskReviewRule;
pub use sudden_payout_disable::SuddenPayoutDisableRule;
pub use velocity::VelocityRule;

use crate::FraudRule;

/// The built-in rule set, in evaluation order.
pub fn all_rules() -> Vec<Box<dyn FraudRule>> {
    vec![
        Box::new(VelocityRule),
        Box::new(BankSwapRule),
        Box::new(GeoMismatchRule),
        Box::new(FailedChargeBurstRule),
        Box::new(SuddenPayoutDisableRule),
        Box::new(HighRiskReviewRule),
    ]
}
