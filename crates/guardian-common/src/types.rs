use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A verified Stripe event as delivered by the webhook boundary or the
/// backfill provider. Immutable once stored; uniquely keyed by
/// `(account_id, event_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Provider-unique event identifier (e.g., `evt_...`).
    pub event_id: String,
    /// Connected Stripe account the event belongs to (e.g., `acct_...`).
    pub account_id: String,
    /// Provider event type string (e.g., `payout.paid`, `charge.failed`).
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    /// The opaque `data` document of the provider event. Inspected only
    /// through the typed accessors in [`crate::event`].
    pub payload: serde_json::Value,
}

/// How an event entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Live,
    Backfill,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Live => "live",
            EventSource::Backfill => "backfill",
        }
    }
}

/// Fraud rule classes, ordered as they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Velocity,
    BankSwap,
    GeoMismatch,
    FailedChargeBurst,
    SuddenPayoutDisable,
    HighRiskReview,
}

impl AlertType {
    pub const ALL: [AlertType; 6] = [
        AlertType::Velocity,
        AlertType::BankSwap,
        AlertType::GeoMismatch,
        AlertType::FailedChargeBurst,
        AlertType::SuddenPayoutDisable,
        AlertType::HighRiskReview,
    ];
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertType::Velocity => "velocity",
            AlertType::BankSwap => "bank_swap",
            AlertType::GeoMismatch => "geo_mismatch",
            AlertType::FailedChargeBurst => "failed_charge_burst",
            AlertType::SuddenPayoutDisable => "sudden_payout_disable",
            AlertType::HighRiskReview => "high_risk_review",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "velocity" => Ok(AlertType::Velocity),
            "bank_swap" => Ok(AlertType::BankSwap),
            "geo_mismatch" => Ok(AlertType::GeoMismatch),
            "failed_charge_burst" => Ok(AlertType::FailedChargeBurst),
            "sudden_payout_disable" => Ok(AlertType::SuddenPayoutDisable),
            "high_risk_review" => Ok(AlertType::HighRiskReview),
            _ => Err(format!("unknown alert type: {s}")),
        }
    }
}

/// Alert severity level, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Output of a rule evaluating true for a given event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredRule {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    /// Payout the rule fired for, when one is involved.
    pub payout_id: Option<String>,
    /// Whether this alert class warrants automatic payout pausing.
    pub auto_pause: bool,
}

/// Feedback verdict on a materialized alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    FalsePositive,
    Legit,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::FalsePositive => write!(f, "false_positive"),
            Verdict::Legit => write!(f, "legit"),
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "false_positive" => Ok(Verdict::FalsePositive),
            "legit" => Ok(Verdict::Legit),
            _ => Err(format!("unknown verdict: {s}")),
        }
    }
}
