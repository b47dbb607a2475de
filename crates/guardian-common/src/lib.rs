//! Shared domain types for the payout-fraud pipeline.
//!
//! Defines the raw Stripe event wrapper ([`types::RawEvent`]), alert
//! enums, and typed accessors over the opaque event payload
//! ([`event`]). Kept free of I/O so every other crate can depend on it.

pub mod event;
pub mod id;
pub mod types;
