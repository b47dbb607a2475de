//! Typed accessors over the opaque Stripe event payload.
//!
//! Rules never chain through raw JSON; they go through [`EventKind`] and
//! the `Option`-returning field structs here. A missing or malformed
//! field is `None`, which rules treat as "no fire".

use crate::types::RawEvent;
use serde::Deserialize;

/// Provider event classes the rule engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Payout,
    Charge,
    AccountUpdated,
    ExternalAccountCreated,
    ReviewOpened,
    Other,
}

impl EventKind {
    pub fn of(event_type: &str) -> Self {
        if event_type.starts_with("payout.") {
            EventKind::Payout
        } else if event_type.starts_with("charge.") {
            EventKind::Charge
        } else if event_type == "account.updated" {
            EventKind::AccountUpdated
        } else if event_type == "external_account.created" {
            EventKind::ExternalAccountCreated
        } else if event_type == "review.opened" {
            EventKind::ReviewOpened
        } else {
            EventKind::Other
        }
    }
}

/// Fields of a payout object the rules care about. Everything is
/// optional; Stripe omits fields freely across API versions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayoutFields {
    pub id: Option<String>,
    /// Amount in the smallest currency unit (cents for USD).
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub destination: Option<PayoutDestination>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayoutDestination {
    pub account_country: Option<String>,
}

impl PayoutFields {
    /// Destination bank country, falling back to the currency prefix the
    /// way the dashboard heuristic does (`usd` → `US`).
    pub fn bank_country(&self) -> Option<String> {
        if let Some(dest) = &self.destination {
            if let Some(country) = &dest.account_country {
                return Some(country.to_uppercase());
            }
        }
        self.currency
            .as_ref()
            .filter(|c| c.len() >= 2)
            .map(|c| c[..2].to_uppercase())
    }

    /// Payout amount in whole USD, when present.
    pub fn amount_usd(&self) -> Option<f64> {
        self.amount.map(|cents| cents as f64 / 100.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChargeFields {
    pub id: Option<String>,
    #[serde(default)]
    pub ip_country: Option<String>,
    #[serde(default)]
    pub billing_details: Option<BillingDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub address: Option<BillingAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingAddress {
    pub country: Option<String>,
}

impl ChargeFields {
    /// Country the charge originated from: IP geolocation first, billing
    /// address as fallback.
    pub fn charge_country(&self) -> Option<String> {
        if let Some(country) = &self.ip_country {
            return Some(country.to_uppercase());
        }
        self.billing_details
            .as_ref()
            .and_then(|b| b.address.as_ref())
            .and_then(|a| a.country.as_ref())
            .map(|c| c.to_uppercase())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountFields {
    pub payouts_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFields {
    pub id: Option<String>,
    pub reason: Option<String>,
    pub charge: Option<serde_json::Value>,
}

impl ReviewFields {
    pub fn charge_id(&self) -> Option<String> {
        match &self.charge {
            Some(serde_json::Value::String(id)) => Some(id.clone()),
            Some(serde_json::Value::Object(obj)) => obj
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            _ => None,
        }
    }
}

impl RawEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::of(&self.event_type)
    }

    fn data_object<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        let obj = self.payload.get("object")?;
        serde_json::from_value(obj.clone()).ok()
    }

    fn previous_attributes(&self) -> Option<&serde_json::Value> {
        self.payload.get("previous_attributes")
    }

    pub fn payout(&self) -> Option<PayoutFields> {
        match self.kind() {
            EventKind::Payout => self.data_object(),
            _ => None,
        }
    }

    pub fn charge(&self) -> Option<ChargeFields> {
        match self.kind() {
            EventKind::Charge => self.data_object(),
            _ => None,
        }
    }

    pub fn account(&self) -> Option<AccountFields> {
        match self.kind() {
            EventKind::AccountUpdated => self.data_object(),
            _ => None,
        }
    }

    pub fn review(&self) -> Option<ReviewFields> {
        match self.kind() {
            EventKind::ReviewOpened => self.data_object(),
            _ => None,
        }
    }

    /// True when an `account.updated` carries `previous_attributes.
    /// external_accounts`, i.e. the bank account on file changed.
    pub fn external_accounts_changed(&self) -> bool {
        self.kind() == EventKind::AccountUpdated
            && self
                .previous_attributes()
                .and_then(|p| p.get("external_accounts"))
                .is_some()
    }

    /// The previous `payouts_enabled` value on an `account.updated`.
    pub fn previous_payouts_enabled(&self) -> Option<bool> {
        self.previous_attributes()?
            .get("payouts_enabled")?
            .as_bool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn event(event_type: &str, payload: serde_json::Value) -> RawEvent {
        RawEvent {
            event_id: "evt_1".into(),
            account_id: "acct_1".into(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    #[test]
    fn payout_fields_parse() {
        let evt = event(
            "payout.paid",
            json!({"object": {"id": "po_1", "amount": 150000, "currency": "usd",
                   "destination": {"account_country": "de"}}}),
        );
        let payout = evt.payout().unwrap();
        assert_eq!(payout.amount_usd(), Some(1500.0));
        assert_eq!(payout.bank_country().as_deref(), Some("DE"));
    }

    #[test]
    fn bank_country_falls_back_to_currency() {
        let evt = event(
            "payout.paid",
            json!({"object": {"id": "po_1", "amount": 5000, "currency": "usd"}}),
        );
        assert_eq!(evt.payout().unwrap().bank_country().as_deref(), Some("US"));
    }

    #[test]
    fn missing_fields_are_none() {
        let evt = event("payout.paid", json!({"object": {}}));
        let payout = evt.payout().unwrap();
        assert!(payout.amount_usd().is_none());
        assert!(payout.bank_country().is_none());
    }

    #[test]
    fn external_accounts_change_detected() {
        let evt = event(
            "account.updated",
            json!({"object": {"payouts_enabled": true},
                   "previous_attributes": {"external_accounts": {"data": []}}}),
        );
        assert!(evt.external_accounts_changed());

        let evt = event("account.updated", json!({"object": {}}));
        assert!(!evt.external_accounts_changed());
    }

    #[test]
    fn accessors_are_kind_gated() {
        let evt = event("charge.failed", json!({"object": {"id": "ch_1"}}));
        assert!(evt.payout().is_none());
        assert!(evt.charge().is_some());
    }
}
