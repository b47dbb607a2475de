//! Alert delivery: notification channels, the queue dispatcher and the
//! payout pauser. Channels are pluggable behind [`NotificationChannel`];
//! the dispatcher drains the persistent queue with retries and
//! dead-letters items whose attempts are exhausted.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod pause;

#[cfg(test)]
mod tests;

pub use channels::{AlertMessage, EmailChannel, NotificationChannel, SlackChannel};
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherSettings};
pub use error::NotifyError;
pub use pause::{PayoutPauser, StripePauser};
