//! Risk scoring for materialized alerts.
//!
//! Each alert class carries a base weight. The weight is discounted by
//! the historical false-positive rate of the same class on this account
//! and across the fleet, then scaled onto a 0..=100 range. Scores are
//! computed once when the alert is created and never revised; feedback
//! only affects alerts raised after it.

use guardian_common::types::AlertType;

pub fn base_weight(alert_type: AlertType) -> f64 {
    match alert_type {
        AlertType::Velocity => 30.0,
        AlertType::BankSwap => 40.0,
        AlertType::GeoMismatch => 25.0,
        AlertType::FailedChargeBurst => 35.0,
        AlertType::SuddenPayoutDisable => 20.0,
        AlertType::HighRiskReview => 50.0,
    }
}

/// Computes the 0..=100 risk score for a new alert.
///
/// `account_fp_rate` and `global_fp_rate` are false-positive fractions
/// in `[0, 1]`; out-of-range inputs are clamped before use.
pub fn risk_score(alert_type: AlertType, account_fp_rate: f64, global_fp_rate: f64) -> u8 {
    let account_fp = account_fp_rate.clamp(0.0, 1.0);
    let global_fp = global_fp_rate.clamp(0.0, 1.0);
    let raw = base_weight(alert_type) * (1.0 - account_fp) * (1.0 - global_fp) * 2.0;
    raw.clamp(0.0, 100.0).round() as u8
}
