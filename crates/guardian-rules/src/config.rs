//! Per-account rule tuning, stored as JSON in a named rule set.
//!
//! Missing fields fall back to the built-in defaults, so a stored config
//! of `{}` behaves exactly like the default rule set.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub velocity: VelocityConfig,
    pub bank_swap: BankSwapConfig,
    pub geo_mismatch: GeoMismatchConfig,
    pub failed_charge_burst: FailedChargeBurstConfig,
    pub sudden_payout_disable: ToggleConfig,
    pub high_risk_review: ToggleConfig,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            velocity: VelocityConfig::default(),
            bank_swap: BankSwapConfig::default(),
            geo_mismatch: GeoMismatchConfig::default(),
            failed_charge_burst: FailedChargeBurstConfig::default(),
            sudden_payout_disable: ToggleConfig::default(),
            high_risk_review: ToggleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    pub enabled: bool,
    /// Payouts allowed within the window; one more fires the rule.
    pub max_payouts: u32,
    pub window_seconds: u64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_payouts: 3,
            window_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankSwapConfig {
    pub enabled: bool,
    /// How far back a bank-account change arms the rule.
    pub lookback_minutes: u64,
    /// Payouts below this amount do not fire the armed rule.
    pub min_payout_usd: f64,
}

impl Default for BankSwapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback_minutes: 30,
            min_payout_usd: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoMismatchConfig {
    pub enabled: bool,
    /// Minimum recent charges from a different country than the payout
    /// destination before the rule fires.
    pub mismatch_charge_count: u32,
}

impl Default for GeoMismatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mismatch_charge_count: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailedChargeBurstConfig {
    pub enabled: bool,
    /// Failed charges, including the triggering one, that make a burst.
    pub min_failed_count: u32,
    pub window_minutes: u64,
}

impl Default for FailedChargeBurstConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_failed_count: 3,
            window_minutes: 5,
        }
    }
}

/// Rules with no tunable thresholds carry only an on/off switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleConfig {
    pub enabled: bool,
}

impl Default for ToggleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
