//! Pure fraud-rule engine.
//!
//! Each rule is an independent predicate over the triggering event, a
//! pre-fetched recent-history window, and the resolved [`config::RuleConfig`].
//! Rules run in a fixed order but are order-independent: a single event may
//! fire several rules, each producing its own [`FiredRule`]. An event
//! missing a field a rule needs yields "no fire" for that rule, never an
//! error, so one malformed payload cannot suppress the other rules.
//!
//! The engine performs no I/O; callers fetch the history window themselves
//! (directly from the event store or from a pre-fetched context) and hand
//! it in newest-first, excluding the triggering event.

pub mod config;
pub mod rules;
pub mod score;


use config::RuleConfig;
use guardian_common::types::{FiredRule, RawEvent};

/// A fraud-detection rule: a pure predicate over
/// `(event, history, config)`.
pub trait FraudRule: Send + Sync {
    /// The alert class this rule produces.
    fn alert_type(&self) -> guardian_common::types::AlertType;

    /// Evaluates the rule. `history` is the account's recent events,
    /// newest-first, excluding `event` itself.
    fn evaluate(
        &self,
        event: &RawEvent,
        history: &[RawEvent],
        config: &RuleConfig,
    ) -> Option<FiredRule>;
}

pub struct RuleEngine {
    rules: Vec<Box<dyn FraudRule>>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(rules::all_rules())
    }
}

impl RuleEngine {
    pub fn new(rules: Vec<Box<dyn FraudRule>>) -> Self {
        Self { rules }
    }

    /// Runs every rule against the event, collecting all fires.
    pub fn evaluate(
        &self,
        event: &RawEvent,
        history: &[RawEvent],
        config: &RuleConfig,
    ) -> Vec<FiredRule> {
        let mut fired = Vec::new();
        for rule in &self.rules {
            if let Some(f) = rule.evaluate(event, history, config) {
                tracing::debug!(
                    rule = %f.alert_type,
                    account_id = %event.account_id,
                    event_id = %event.event_id,
                    "Rule fired"
                );
                fired.push(f);
            }
        }
        fired
    }
}
